//! PBKDF2-HMAC-SHA256 in the `$pbkdf2-sha256$rounds$salt$checksum` format
//!
//! Salt and checksum are adapted base64. Two backends compute the key: the
//! `pbkdf2` crate (behind the `pbkdf2-backend` feature) and a builtin
//! single-block HMAC loop.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::codec::{ab64, AB64_CHARS};
use crate::handlers::{
    Backend, Backends, ChecksumSpec, HandlerError, HashHandler, HashRecord, Result, RoundsCost,
    RoundsSpec, SaltSpec,
};
use crate::registry::HandlerRegistry;

const NAME: &str = "pbkdf2_sha256";
const IDENT: &str = "$pbkdf2-sha256$";
const KEY_SIZE: usize = 32;

#[derive(Debug)]
pub struct Pbkdf2Sha256 {
    salt: SaltSpec,
    rounds: RoundsSpec,
    checksum: ChecksumSpec,
    backends: Backends,
}

impl Pbkdf2Sha256 {
    pub fn new() -> Result<Self> {
        Ok(Self {
            salt: SaltSpec::encoded(0, Some(1024), 16, ab64())?,
            rounds: RoundsSpec::new(1, u32::MAX, 29000, RoundsCost::Linear)?,
            checksum: ChecksumSpec::fixed(43, AB64_CHARS)?,
            backends: Backends::new(
                NAME,
                vec![
                    Backend::new("pbkdf2", || cfg!(feature = "pbkdf2-backend"), derive_with_pbkdf2),
                    Backend::new("hmac", || true, derive_with_hmac),
                ],
            )?,
        })
    }
}

fn key_params(record: &HashRecord) -> Result<(Vec<u8>, u32)> {
    let salt = record.salt.as_deref().ok_or(HandlerError::MissingSetting("salt"))?;
    let rounds = record.rounds.ok_or(HandlerError::MissingSetting("rounds"))?;
    Ok((ab64().decode_bytes(salt)?, rounds))
}

#[cfg(feature = "pbkdf2-backend")]
fn derive_with_pbkdf2(secret: &[u8], record: &HashRecord) -> Result<String> {
    let (salt, rounds) = key_params(record)?;
    let mut key = [0u8; KEY_SIZE];
    ::pbkdf2::pbkdf2::<Hmac<Sha256>>(secret, &salt, rounds, &mut key).map_err(|err| {
        HandlerError::BackendFailure {
            backend: "pbkdf2",
            reason: err.to_string(),
        }
    })?;
    Ok(ab64().encode_bytes(&key))
}

#[cfg(not(feature = "pbkdf2-backend"))]
fn derive_with_pbkdf2(_: &[u8], _: &HashRecord) -> Result<String> {
    Err(HandlerError::MissingBackend {
        scheme: NAME.to_string(),
        backend: "pbkdf2".to_string(),
    })
}

/// PBKDF2 restricted to one output block (the key is exactly one SHA-256)
fn derive_with_hmac(secret: &[u8], record: &HashRecord) -> Result<String> {
    let (salt, rounds) = key_params(record)?;
    let prf = Hmac::<Sha256>::new_from_slice(secret).map_err(|err| HandlerError::BackendFailure {
        backend: "hmac",
        reason: err.to_string(),
    })?;

    let mut mac = prf.clone();
    mac.update(&salt);
    mac.update(&1u32.to_be_bytes());
    let mut block = mac.finalize().into_bytes();
    let mut key = block.clone();

    for _ in 1..rounds {
        let mut mac = prf.clone();
        mac.update(&block);
        block = mac.finalize().into_bytes();
        key.iter_mut().zip(block.iter()).for_each(|(k, b)| *k ^= b);
    }
    Ok(ab64().encode_bytes(&key))
}

fn parse_rounds(rounds: &str) -> Result<u32> {
    if rounds.is_empty() || (rounds.len() > 1 && rounds.starts_with('0')) {
        return Err(HandlerError::invalid_hash(NAME, "malformed rounds"));
    }
    rounds
        .parse()
        .map_err(|_| HandlerError::invalid_hash(NAME, "malformed rounds"))
}

impl HashHandler for Pbkdf2Sha256 {
    fn name(&self) -> &str {
        NAME
    }

    fn ident(&self) -> Option<String> {
        Some(IDENT.to_string())
    }

    fn salt_spec(&self) -> Option<&SaltSpec> {
        Some(&self.salt)
    }

    fn rounds_spec(&self) -> Option<&RoundsSpec> {
        Some(&self.rounds)
    }

    fn checksum_spec(&self) -> Option<&ChecksumSpec> {
        Some(&self.checksum)
    }

    fn backends(&self) -> Option<&Backends> {
        Some(&self.backends)
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let rest = hash
            .strip_prefix(IDENT)
            .ok_or_else(|| HandlerError::invalid_hash(NAME, "missing ident"))?;
        let mut parts = rest.split('$');
        let (Some(rounds), Some(salt)) = (parts.next(), parts.next()) else {
            return Err(HandlerError::invalid_hash(NAME, "malformed hash"));
        };
        let checksum = parts.next();
        if parts.next().is_some() {
            return Err(HandlerError::invalid_hash(NAME, "too many sections"));
        }

        let rounds = self.rounds.normalize(parse_rounds(rounds)?, false)?;
        ab64()
            .decode_bytes(salt)
            .map_err(|err| HandlerError::invalid_hash(NAME, format!("salt: {err}")))?;
        let checksum = checksum
            .map(|checksum| self.checksum.normalize(NAME, checksum))
            .transpose()?;

        Ok(HashRecord {
            ident: None,
            salt: Some(salt.to_string()),
            rounds: Some(rounds),
            checksum,
        })
    }

    fn render(&self, record: &HashRecord) -> Result<String> {
        let salt = record.salt.as_deref().ok_or(HandlerError::MissingSetting("salt"))?;
        let rounds = record.rounds.ok_or(HandlerError::MissingSetting("rounds"))?;
        Ok(match record.checksum.as_deref() {
            Some(checksum) => format!("{IDENT}{rounds}${salt}${checksum}"),
            None => format!("{IDENT}{rounds}${salt}"),
        })
    }

    fn calc_checksum(&self, secret: &[u8], record: &HashRecord) -> Result<String> {
        self.backends.compute(secret, record)
    }
}

pub fn pbkdf2_sha256(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(Pbkdf2Sha256::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::Settings;

    fn record(salt: &[u8], rounds: u32) -> HashRecord {
        HashRecord {
            salt: Some(ab64().encode_bytes(salt)),
            rounds: Some(rounds),
            ..Default::default()
        }
    }

    fn expected(key_hex: &str) -> String {
        ab64().encode_bytes(&hex::decode(key_hex).unwrap())
    }

    #[test]
    fn test_hmac_backend_vectors() {
        let cases = [
            (1, "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"),
            (2, "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"),
            (4096, "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"),
        ];
        for (rounds, key) in cases {
            let checksum = derive_with_hmac(b"password", &record(b"salt", rounds)).unwrap();
            assert_eq!(checksum, expected(key), "rounds={rounds}");
        }
    }

    #[cfg(feature = "pbkdf2-backend")]
    #[test]
    fn test_backends_agree() {
        let record = record(b"NaCl and pepper", 1000);
        assert_eq!(
            derive_with_pbkdf2(b"secret", &record).unwrap(),
            derive_with_hmac(b"secret", &record).unwrap()
        );
    }

    #[test]
    fn test_hash_and_verify() {
        let h = Pbkdf2Sha256::new().unwrap();
        let hash = h.hash(b"password", &Settings::builder().rounds(1000).build()).unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$1000$"));
        assert!(h.identify(&hash));
        assert!(h.verify(b"password", &hash).unwrap());
        assert!(!h.verify(b"Password", &hash).unwrap());

        let record = h.parse(&hash).unwrap();
        assert_eq!(ab64().decode_bytes(record.salt.as_deref().unwrap()).unwrap().len(), 16);
        assert_eq!(h.render(&record).unwrap(), hash);
    }

    #[test]
    fn test_explicit_salt() {
        let h = Pbkdf2Sha256::new().unwrap();
        let settings = Settings::builder().salt("c2FsdA").rounds(1).build();
        let hash = h.hash(b"password", &settings).unwrap();
        assert_eq!(
            hash,
            format!(
                "$pbkdf2-sha256$1$c2FsdA${}",
                expected("120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b")
            )
        );
    }

    #[test]
    fn test_salt_size_counts_bytes() {
        let h = Pbkdf2Sha256::new().unwrap();
        let settings = Settings::builder().salt_size(3).rounds(1).build();
        let record = h.parse(&h.hash(b"x", &settings).unwrap()).unwrap();
        assert_eq!(record.salt.map(|s| s.len()), Some(4));
    }

    #[test]
    fn test_rejects_malformed_hashes() {
        let h = Pbkdf2Sha256::new().unwrap();
        let checksum = "A".repeat(43);
        for hash in [
            format!("$pbkdf2-sha256$01000$c2FsdA${checksum}"),
            format!("$pbkdf2-sha256$abc$c2FsdA${checksum}"),
            format!("$pbkdf2-sha256$1000$c2FsdA${checksum}$"),
            format!("$pbkdf2-sha256$1000$c2Fs!A${checksum}"),
            "$pbkdf2-sha256$1000$c2FsdA$tooshort".to_string(),
            "$pbkdf2-sha256$1000".to_string(),
            format!("$pbkdf2$1000$c2FsdA${checksum}"),
        ] {
            assert!(matches!(h.parse(&hash), Err(HandlerError::InvalidHash { .. })), "{hash}");
        }
        assert!(matches!(
            h.parse(&format!("$pbkdf2-sha256$0$c2FsdA${checksum}")),
            Err(HandlerError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_genconfig_has_placeholder_checksum() {
        let h = Pbkdf2Sha256::new().unwrap();
        let settings = Settings::builder().salt("c2FsdA").build();
        assert_eq!(
            h.genconfig(&settings).unwrap(),
            format!("$pbkdf2-sha256$29000$c2FsdA${}", "A".repeat(43))
        );
    }

    #[test]
    fn test_backend_selection() {
        let h = Pbkdf2Sha256::new().unwrap();
        let backends = h.backends().unwrap();
        assert_eq!(backends.names(), ["pbkdf2", "hmac"]);
        assert!(backends.has_backend(Some("hmac")).unwrap());
        assert!(backends.has_backend(None).unwrap());
        assert!(matches!(
            backends.has_backend(Some("openssl")),
            Err(HandlerError::UnknownBackend { .. })
        ));

        assert_eq!(backends.set_backend("hmac").unwrap(), "hmac");
        let settings = Settings::builder().salt("c2FsdA").rounds(2).build();
        let hash = h.hash(b"password", &settings).unwrap();
        assert!(hash.ends_with(&expected(
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        )));

        let default = if cfg!(feature = "pbkdf2-backend") { "pbkdf2" } else { "hmac" };
        assert_eq!(backends.set_backend("default").unwrap(), default);
        assert!(h.verify(b"password", &hash).unwrap());
    }
}
