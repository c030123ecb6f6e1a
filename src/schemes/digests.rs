//! Unsalted digest schemes

use std::sync::Arc;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::codec::{b64, LOWER_HEX_CHARS};
use crate::handlers::{ChecksumSpec, HandlerError, HashHandler, HashRecord, Result};
use crate::registry::HandlerRegistry;

type DigestFn = fn(&[u8]) -> Vec<u8>;

fn digest<D: Digest>(secret: &[u8]) -> Vec<u8> {
    D::digest(secret).to_vec()
}

/// Bare hex-encoded digest (`5f4dcc3b...`)
#[derive(Debug)]
pub struct HexDigest {
    name: &'static str,
    checksum: ChecksumSpec,
    digest: DigestFn,
}

impl HexDigest {
    fn new(name: &'static str, digest_size: usize, digest: DigestFn) -> Result<Self> {
        Ok(Self {
            name,
            checksum: ChecksumSpec::fixed(digest_size * 2, LOWER_HEX_CHARS)?,
            digest,
        })
    }
}

impl HashHandler for HexDigest {
    fn name(&self) -> &str {
        self.name
    }

    fn checksum_spec(&self) -> Option<&ChecksumSpec> {
        Some(&self.checksum)
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let checksum = self.checksum.normalize(self.name, &hash.to_ascii_lowercase())?;
        Ok(HashRecord {
            checksum: Some(checksum),
            ..Default::default()
        })
    }

    fn render(&self, record: &HashRecord) -> Result<String> {
        record
            .checksum
            .clone()
            .ok_or(HandlerError::MissingSetting("checksum"))
    }

    fn calc_checksum(&self, secret: &[u8], _: &HashRecord) -> Result<String> {
        Ok(hex::encode((self.digest)(secret)))
    }
}

/// `{TAG}` followed by the padded base64 digest, as used by LDAP directories
#[derive(Debug)]
pub struct LdapDigest {
    name: &'static str,
    prefix: &'static str,
    digest_size: usize,
    digest: DigestFn,
}

impl LdapDigest {
    fn encoded_len(&self) -> usize {
        self.digest_size.div_ceil(3) * 4
    }
}

fn pad_base64(mut encoded: String) -> String {
    while encoded.len() % 4 != 0 {
        encoded.push('=');
    }
    encoded
}

impl HashHandler for LdapDigest {
    fn name(&self) -> &str {
        self.name
    }

    fn ident(&self) -> Option<String> {
        Some(self.prefix.to_string())
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let checksum = hash
            .strip_prefix(self.prefix)
            .ok_or_else(|| HandlerError::invalid_hash(self.name, format!("missing {} prefix", self.prefix)))?;
        if checksum.len() != self.encoded_len() {
            return Err(HandlerError::invalid_hash(self.name, "wrong checksum size"));
        }

        let raw = b64()
            .decode_bytes(checksum.trim_end_matches('='))
            .map_err(|err| HandlerError::invalid_hash(self.name, err.to_string()))?;
        if raw.len() != self.digest_size {
            return Err(HandlerError::invalid_hash(self.name, "wrong checksum size"));
        }
        Ok(HashRecord {
            checksum: Some(checksum.to_string()),
            ..Default::default()
        })
    }

    fn render(&self, record: &HashRecord) -> Result<String> {
        let checksum = record
            .checksum
            .as_deref()
            .ok_or(HandlerError::MissingSetting("checksum"))?;
        Ok(format!("{}{}", self.prefix, checksum))
    }

    fn calc_checksum(&self, secret: &[u8], _: &HashRecord) -> Result<String> {
        Ok(pad_base64(b64().encode_bytes(&(self.digest)(secret))))
    }
}

pub fn hex_md5(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(HexDigest::new("hex_md5", 16, digest::<Md5>)?))
}

pub fn hex_sha1(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(HexDigest::new("hex_sha1", 20, digest::<Sha1>)?))
}

pub fn hex_sha256(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(HexDigest::new("hex_sha256", 32, digest::<Sha256>)?))
}

pub fn hex_sha512(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(HexDigest::new("hex_sha512", 64, digest::<Sha512>)?))
}

pub fn ldap_md5(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(LdapDigest {
        name: "ldap_md5",
        prefix: "{MD5}",
        digest_size: 16,
        digest: digest::<Md5>,
    }))
}

pub fn ldap_sha1(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(LdapDigest {
        name: "ldap_sha1",
        prefix: "{SHA}",
        digest_size: 20,
        digest: digest::<Sha1>,
    }))
}
