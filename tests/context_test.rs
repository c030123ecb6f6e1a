use std::sync::Arc;
use std::thread;

use passkit::policy::{Policy, PolicySource};
use passkit::{ContextError, CryptContext};

const SITE_POLICY: &str = "\
[passlib]
schemes = pbkdf2_sha256, phpass, ldap_hex_md5, hex_md5, roundup_plaintext
default = pbkdf2_sha256
deprecated = ldap_hex_md5, hex_md5, roundup_plaintext
pbkdf2_sha256.min_rounds = 1000
pbkdf2_sha256.default_rounds = 2000
phpass.default_rounds = 8
staff.context.default = phpass
staff.context.deprecated = hex_md5
staff.phpass.min_rounds = 9
staff.phpass.default_rounds = 10
";

fn context() -> CryptContext {
    let policy = Policy::from_source(PolicySource::Text(SITE_POLICY.to_string())).unwrap();
    CryptContext::new(policy).unwrap()
}

#[test]
fn test_hash_and_verify_every_scheme() {
    let ctx = context();
    let policy = ctx.policy();
    for scheme in policy.schemes().iter().map(String::as_str) {
        let hash = ctx.hash("correct horse", None, Some(scheme)).unwrap();
        assert_eq!(ctx.identify(&hash, None).unwrap().as_deref(), Some(scheme), "{hash}");
        assert!(ctx.verify("correct horse", &hash, None).unwrap(), "{scheme}");
        assert!(!ctx.verify("battery staple", &hash, None).unwrap(), "{scheme}");
    }
}

#[test]
fn test_category_defaults() {
    let ctx = context();
    assert!(ctx.hash("pw", None, None).unwrap().starts_with("$pbkdf2-sha256$2000$"));
    // fourth char is log2(rounds) in hash64: '8' is 10
    assert!(ctx.hash("pw", Some("staff"), None).unwrap().starts_with("$P$8"));
    assert!(ctx.hash("pw", Some("guest"), None).unwrap().starts_with("$pbkdf2-sha256$"));
}

#[test]
fn test_category_rounds_policy() {
    let ctx = context();
    let weak = ctx.hash("pw", None, Some("phpass")).unwrap();
    assert!(!ctx.needs_update(&weak, None).unwrap());
    assert!(ctx.needs_update(&weak, Some("staff")).unwrap());

    let (matched, upgraded) = ctx.verify_and_update("pw", &weak, Some("staff")).unwrap();
    assert!(matched);
    let upgraded = upgraded.unwrap();
    assert!(upgraded.starts_with("$P$8"));
    assert!(!ctx.needs_update(&upgraded, Some("staff")).unwrap());
}

#[test]
fn test_legacy_hashes_migrate() {
    let ctx = context();
    let legacy = [
        "{MD5}5f4dcc3b5aa765d61d8327deb882cf99",
        "5f4dcc3b5aa765d61d8327deb882cf99",
        "{plaintext}password",
    ];
    for hash in legacy {
        assert!(ctx.needs_update(hash, None).unwrap(), "{hash}");
        let (matched, replacement) = ctx.verify_and_update("password", hash, None).unwrap();
        assert!(matched, "{hash}");
        let replacement = replacement.unwrap();
        assert_eq!(ctx.identify(&replacement, None).unwrap().as_deref(), Some("pbkdf2_sha256"));

        assert_eq!(ctx.verify_and_update("wrong", hash, None).unwrap(), (false, None));
    }

    // staff replaces the deprecated list, so only hex_md5 is outdated there
    assert!(!ctx.needs_update("{MD5}5f4dcc3b5aa765d61d8327deb882cf99", Some("staff")).unwrap());
    assert!(ctx.needs_update("5f4dcc3b5aa765d61d8327deb882cf99", Some("staff")).unwrap());
}

#[test]
fn test_unrecognized_hash() {
    let ctx = context();
    assert_eq!(ctx.identify("$2b$12$notabcrypt", None).unwrap(), None);
    assert!(matches!(ctx.verify("pw", "$2b$12$notabcrypt", None), Err(ContextError::UnknownHash)));
    assert!(matches!(ctx.needs_update("$2b$12$notabcrypt", None), Err(ContextError::UnknownHash)));
    assert!(matches!(
        ctx.hash("pw", None, Some("ldap_sha1")),
        Err(ContextError::UnknownScheme(_))
    ));
}

#[test]
fn test_genconfig_then_genhash() {
    let ctx = context();
    let config = ctx.genconfig(None, Some("phpass")).unwrap();
    let handler = ctx.registry().resolve("phpass").unwrap();
    let hash = handler.genhash(b"pw", &config).unwrap();
    assert_eq!(&hash[..12], &config[..12]);
    assert!(ctx.verify("pw", &hash, None).unwrap());
}

#[test]
fn test_concurrent_use_with_policy_swaps() {
    let ctx = Arc::new(context());
    let stored = ctx.hash("shared secret", None, Some("phpass")).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            let stored = stored.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    assert!(ctx.verify("shared secret", &stored, None).unwrap());
                    let fresh = ctx.hash("shared secret", None, None).unwrap();
                    assert!(ctx.verify("shared secret", &fresh, None).unwrap());
                }
            })
        })
        .collect();

    let swapper = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            for rounds in [1500, 2500, 3000] {
                let text = format!("[passlib]\npbkdf2_sha256.default_rounds = {rounds}\n");
                ctx.update(PolicySource::Text(text)).unwrap();
            }
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    swapper.join().unwrap();

    assert_eq!(ctx.policy().options("pbkdf2_sha256", None).default_rounds, Some(3000));
    let metrics = ctx.metrics();
    assert_eq!(metrics.verifies, 80);
    assert_eq!(metrics.verify_failures, 0);
}
