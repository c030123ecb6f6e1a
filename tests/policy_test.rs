use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

use passkit::policy::{Policy, PolicyError, PolicySource, PolicyValue, TextEncoding, VaryRounds};

const BASE_POLICY: &str = "\
[passlib]
schemes = pbkdf2_sha256, phpass, hex_md5
default = pbkdf2_sha256
deprecated = hex_md5
all.vary_rounds = 10%%
pbkdf2_sha256.min_rounds = 10000
pbkdf2_sha256.default_rounds = 20000
admin.pbkdf2_sha256.min_rounds = 40000
admin.context.default = phpass
";

fn write(dir: &TempDir, name: &str, contents: impl AsRef<[u8]>) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_layered_file_sources() {
    let temp_dir = TempDir::new().unwrap();
    let base = write(&temp_dir, "base.ini", BASE_POLICY);
    let local = write(
        &temp_dir,
        "local.toml",
        "[passlib]\n\"pbkdf2_sha256.default_rounds\" = 30000\n\n[passlib.admin.context]\ndefault = \"pbkdf2_sha256\"\n",
    );

    let policy = Policy::from_sources([
        PolicySource::path(&base),
        PolicySource::path(&local),
        PolicySource::Map(BTreeMap::from([(
            "phpass.default_rounds".to_string(),
            PolicyValue::Int(12),
        )])),
    ])
    .unwrap();

    assert_eq!(policy.schemes(), ["pbkdf2_sha256", "phpass", "hex_md5"]);
    assert_eq!(policy.default_scheme(Some("admin")), Some("pbkdf2_sha256"));

    let options = policy.options("pbkdf2_sha256", None);
    assert_eq!(options.min_rounds, Some(10000));
    assert_eq!(options.default_rounds, Some(30000));
    assert_eq!(options.vary_rounds, Some(VaryRounds::Fraction(0.1)));

    let admin = policy.options("pbkdf2_sha256", Some("admin"));
    assert_eq!(admin.min_rounds, Some(40000));
    assert_eq!(admin.default_rounds, Some(30000));

    assert_eq!(policy.options("phpass", None).default_rounds, Some(12));
}

#[test]
fn test_encoded_policy_files() {
    let temp_dir = TempDir::new().unwrap();
    let expected = Policy::from_source(PolicySource::Text(BASE_POLICY.to_string())).unwrap();

    let mut utf16_be = vec![0xfe, 0xff];
    utf16_be.extend(BASE_POLICY.encode_utf16().flat_map(u16::to_be_bytes));
    let path = write(&temp_dir, "policy-utf16.ini", &utf16_be);
    let policy = Policy::from_source(PolicySource::Path {
        path,
        encoding: TextEncoding::Utf16,
    })
    .unwrap();
    assert_eq!(policy, expected);

    let with_bom = [b"\xef\xbb\xbf".as_slice(), BASE_POLICY.as_bytes()].concat();
    let policy = Policy::from_source(PolicySource::Bytes {
        data: with_bom,
        encoding: TextEncoding::Utf8,
    })
    .unwrap();
    assert_eq!(policy, expected);

    let latin1 = write(&temp_dir, "latin1.ini", b"[passlib]\ndefault = caf\xe9\n");
    assert!(matches!(
        Policy::from_source(PolicySource::path(latin1)),
        Err(PolicyError::Encoding(_))
    ));
}

#[test]
fn test_serialized_policy_reloads() {
    let temp_dir = TempDir::new().unwrap();
    let policy = Policy::from_source(PolicySource::Text(BASE_POLICY.to_string())).unwrap();

    let ini = write(&temp_dir, "saved.ini", policy.to_ini_string());
    assert_eq!(Policy::from_source(PolicySource::path(ini)).unwrap(), policy);

    let toml = write(&temp_dir, "saved.toml", policy.to_toml_string().unwrap());
    assert_eq!(Policy::from_source(PolicySource::path(toml)).unwrap(), policy);

    let json = serde_json::to_string(&policy.to_json().unwrap()).unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(Policy::from_source(PolicySource::Json(reparsed)).unwrap(), policy);
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = Policy::from_source(PolicySource::path(temp_dir.path().join("absent.ini")));
    assert!(matches!(result, Err(PolicyError::Io { .. })));
}

#[test]
fn test_unknown_keys_rejected_from_files() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(&temp_dir, "bad.ini", "[passlib]\nschemes = phpass\nphpass.salt_chars = abc\n");
    assert!(matches!(
        Policy::from_source(PolicySource::path(path)),
        Err(PolicyError::UnknownOption(_))
    ));

    let path = write(&temp_dir, "salt.ini", "[passlib]\nschemes = phpass\nphpass.salt = abcdefgh\n");
    assert!(matches!(
        Policy::from_source(PolicySource::path(path)),
        Err(PolicyError::ForbiddenOption(_))
    ));
}

#[test]
fn test_load_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(&temp_dir, "passkit.ini", BASE_POLICY);

    // the only test in this binary that touches the process environment
    unsafe {
        std::env::set_var("PASSKIT_POLICY", &path);
        std::env::set_var("PASSKIT__PASSLIB__ALL__VARY_ROUNDS", "0.05");
        std::env::set_var("PASSKIT__PASSLIB__PHPASS__DEFAULT_ROUNDS", "11");
    }
    let policy = Policy::load();
    unsafe {
        std::env::remove_var("PASSKIT_POLICY");
        std::env::remove_var("PASSKIT__PASSLIB__ALL__VARY_ROUNDS");
        std::env::remove_var("PASSKIT__PASSLIB__PHPASS__DEFAULT_ROUNDS");
    }

    let policy = policy.unwrap();
    assert_eq!(policy.default_scheme(None), Some("pbkdf2_sha256"));
    assert_eq!(policy.options("phpass", None).vary_rounds, Some(VaryRounds::Fraction(0.05)));
    assert_eq!(policy.options("phpass", None).default_rounds, Some(11));
    assert_eq!(policy.options("pbkdf2_sha256", None).min_rounds, Some(10000));
}
