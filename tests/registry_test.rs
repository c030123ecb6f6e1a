use md5::{Digest, Md5};
use std::sync::Arc;

use passkit::codec::HASH64_CHARS;
use passkit::handlers::{HandlerError, HashHandler, HashRecord, Result, SaltSpec};
use passkit::policy::{Policy, PolicyValue};
use passkit::registry::{HandlerRegistry, ModuleTable, RegistryError};
use passkit::{ContextError, CryptContext};

/// `$smd5$<salt>$<hex md5(salt + secret)>`
#[derive(Debug)]
struct SaltedMd5 {
    salt: SaltSpec,
}

impl SaltedMd5 {
    fn new() -> Result<Self> {
        Ok(Self {
            salt: SaltSpec::new(4, Some(16), 8, HASH64_CHARS)?,
        })
    }
}

impl HashHandler for SaltedMd5 {
    fn name(&self) -> &str {
        "salted_md5"
    }

    fn ident(&self) -> Option<String> {
        Some("$smd5$".to_string())
    }

    fn salt_spec(&self) -> Option<&SaltSpec> {
        Some(&self.salt)
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let rest = hash
            .strip_prefix("$smd5$")
            .ok_or_else(|| HandlerError::invalid_hash(self.name(), "missing ident"))?;
        let (salt, checksum) = rest
            .split_once('$')
            .ok_or_else(|| HandlerError::invalid_hash(self.name(), "missing separator"))?;
        Ok(HashRecord {
            salt: Some(self.salt.normalize(salt, false)?),
            checksum: Some(checksum.to_string()),
            ..Default::default()
        })
    }

    fn render(&self, record: &HashRecord) -> Result<String> {
        Ok(format!(
            "$smd5${}${}",
            record.salt.as_deref().unwrap_or_default(),
            record.checksum.as_deref().unwrap_or_default()
        ))
    }

    fn calc_checksum(&self, secret: &[u8], record: &HashRecord) -> Result<String> {
        let mut hasher = Md5::new();
        hasher.update(record.salt.as_deref().unwrap_or_default());
        hasher.update(secret);
        Ok(hex::encode(hasher.finalize()))
    }
}

fn salted_md5(_: &HandlerRegistry) -> std::result::Result<Arc<dyn HashHandler>, HandlerError> {
    Ok(Arc::new(SaltedMd5::new()?))
}

fn policy(entries: &[(&str, &str)]) -> Policy {
    Policy::from_entries(entries.iter().map(|(k, v)| (*k, PolicyValue::from(*v)))).unwrap()
}

#[test]
fn test_builtins_are_lazy() {
    let registry = HandlerRegistry::with_builtins();
    let listed = registry.list(false);
    for name in ["hex_md5", "ldap_sha1", "phpass", "pbkdf2_sha256", "roundup_plaintext"] {
        assert!(listed.contains(&name.to_string()), "{name}");
    }
    assert!(!registry.has_handler("phpass", true));

    assert_eq!(registry.resolve("PHPASS").unwrap().name(), "phpass");
    assert!(registry.has_handler("phpass", true));
    assert!(!registry.has_handler("hex_md5", true));
}

#[test]
fn test_wrapper_resolves_through_registry() {
    let registry = HandlerRegistry::with_builtins();
    let wrapper = registry.resolve("ldap_hex_md5").unwrap();
    assert_eq!(
        wrapper.hash(b"password", &Default::default()).unwrap(),
        "{MD5}5f4dcc3b5aa765d61d8327deb882cf99"
    );
    assert!(registry.has_handler("hex_md5", true));
}

#[test]
fn test_custom_module_table() {
    let table = ModuleTable::builtins().with("myapp.hashes", "salted_md5", salted_md5);
    let registry = HandlerRegistry::new(Arc::new(table));
    registry.register_lazy("salted_md5", "myapp.hashes").unwrap();
    registry.register_lazy("smd5", "myapp.hashes:salted_md5").unwrap();

    let handler = registry.resolve("salted_md5").unwrap();
    let hash = handler.hash(b"secret", &Default::default()).unwrap();
    assert!(hash.starts_with("$smd5$"));
    assert!(handler.verify(b"secret", &hash).unwrap());
    assert!(!handler.verify(b"Secret", &hash).unwrap());

    // factory result names a different scheme than the entry
    assert!(matches!(
        registry.resolve("smd5"),
        Err(RegistryError::NameMismatch { .. })
    ));
}

#[test]
fn test_custom_handler_in_context() {
    let registry = HandlerRegistry::with_builtins();
    registry.register(Arc::new(SaltedMd5::new().unwrap()), false).unwrap();

    let ctx = CryptContext::with_registry(
        registry.clone(),
        policy(&[
            ("schemes", "salted_md5, hex_md5"),
            ("deprecated", "hex_md5"),
            ("salted_md5.salt_size", "12"),
        ]),
    )
    .unwrap();

    let hash = ctx.hash("hunter2", None, None).unwrap();
    let salt = hash.trim_start_matches("$smd5$").split('$').next().unwrap();
    assert_eq!(salt.len(), 12);
    assert!(ctx.verify("hunter2", &hash, None).unwrap());
    assert!(!ctx.needs_update(&hash, None).unwrap());

    let legacy = "5f4dcc3b5aa765d61d8327deb882cf99";
    let (matched, replacement) = ctx.verify_and_update("password", legacy, None).unwrap();
    assert!(matched);
    let replacement = replacement.unwrap();
    assert_eq!(ctx.identify(&replacement, None).unwrap().as_deref(), Some("salted_md5"));

    assert!(registry.unload_handler("salted_md5", false));
    assert!(matches!(
        CryptContext::with_registry(registry, policy(&[("schemes", "salted_md5")])),
        Err(ContextError::Registry(RegistryError::UnknownHandler(_)))
    ));
}

#[test]
fn test_force_replaces_builtin() {
    #[derive(Debug)]
    struct Shouting;

    impl HashHandler for Shouting {
        fn name(&self) -> &str {
            "plaintext"
        }

        fn parse(&self, hash: &str) -> Result<HashRecord> {
            Ok(HashRecord {
                checksum: Some(hash.to_string()),
                ..Default::default()
            })
        }

        fn render(&self, record: &HashRecord) -> Result<String> {
            Ok(record.checksum.clone().unwrap_or_default())
        }

        fn calc_checksum(&self, secret: &[u8], _: &HashRecord) -> Result<String> {
            Ok(String::from_utf8_lossy(secret).to_uppercase())
        }
    }

    let registry = HandlerRegistry::with_builtins();
    let original = registry.resolve("plaintext").unwrap();
    assert!(matches!(
        registry.register(Arc::new(Shouting), false),
        Err(RegistryError::NameCollision(_))
    ));

    registry.register(Arc::new(Shouting), true).unwrap();
    let replaced = registry.resolve("plaintext").unwrap();
    assert!(!Arc::ptr_eq(&original, &replaced));
    assert_eq!(replaced.hash(b"quiet", &Default::default()).unwrap(), "QUIET");
}
