//! Portable PHP password hashes (`$P$` / `$H$`)
//!
//! Layout: ident, one hash64 char holding log2(rounds), 8 salt chars and a
//! 22 char checksum. The checksum is the hash64 encoding of
//! `md5(...md5(md5(salt + secret) + secret)...)` iterated `2^rounds` times.

use std::sync::Arc;

use md5::{Digest, Md5};

use crate::codec::{h64, HASH64_CHARS};
use crate::handlers::{
    ChecksumSpec, HandlerError, HashHandler, HashRecord, IdentSpec, Result, RoundsCost,
    RoundsSpec, SaltSpec,
};
use crate::registry::HandlerRegistry;

const NAME: &str = "phpass";
const SALT_SIZE: usize = 8;

#[derive(Debug)]
pub struct Phpass {
    idents: IdentSpec,
    salt: SaltSpec,
    rounds: RoundsSpec,
    checksum: ChecksumSpec,
}

impl Phpass {
    pub fn new() -> Result<Self> {
        Ok(Self {
            idents: IdentSpec::new(["$P$", "$H$"], "$P$")?.with_aliases([("P", "$P$"), ("H", "$H$")])?,
            salt: SaltSpec::new(SALT_SIZE, Some(SALT_SIZE), SALT_SIZE, HASH64_CHARS)?,
            rounds: RoundsSpec::new(7, 30, 19, RoundsCost::Log2)?,
            checksum: ChecksumSpec::fixed(22, HASH64_CHARS)?,
        })
    }
}

impl HashHandler for Phpass {
    fn name(&self) -> &str {
        NAME
    }

    fn ident_spec(&self) -> Option<&IdentSpec> {
        Some(&self.idents)
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

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let ident = self
            .idents
            .matching(hash)
            .ok_or_else(|| HandlerError::invalid_hash(NAME, "missing ident"))?;
        let rest = &hash[ident.len()..];
        if !rest.is_ascii() || rest.len() < 1 + SALT_SIZE {
            return Err(HandlerError::invalid_hash(NAME, "hash too short"));
        }

        let (rounds, rest) = rest.split_at(1);
        let (salt, checksum) = rest.split_at(SALT_SIZE);
        let rounds = h64()
            .decode_int6(rounds)
            .map_err(|err| HandlerError::invalid_hash(NAME, err.to_string()))?;
        let rounds = self.rounds.normalize(u32::from(rounds), false)?;
        if salt.chars().any(|c| !HASH64_CHARS.contains(c)) {
            return Err(HandlerError::invalid_hash(NAME, "invalid characters in salt"));
        }
        let checksum = match checksum {
            "" => None,
            checksum => Some(self.checksum.normalize(NAME, checksum)?),
        };

        Ok(HashRecord {
            ident: Some(ident.to_string()),
            salt: Some(salt.to_string()),
            rounds: Some(rounds),
            checksum,
        })
    }

    fn render(&self, record: &HashRecord) -> Result<String> {
        let ident = record.ident.as_deref().ok_or(HandlerError::MissingSetting("ident"))?;
        let salt = record.salt.as_deref().ok_or(HandlerError::MissingSetting("salt"))?;
        let rounds = record.rounds.ok_or(HandlerError::MissingSetting("rounds"))?;
        let rounds = u8::try_from(rounds).map_err(|_| HandlerError::OutOfRange {
            setting: "rounds",
            reason: format!("{rounds} does not fit in one hash64 char"),
        })?;
        Ok(format!(
            "{ident}{}{salt}{}",
            h64().encode_int6(rounds)?,
            record.checksum.as_deref().unwrap_or_default()
        ))
    }

    fn calc_checksum(&self, secret: &[u8], record: &HashRecord) -> Result<String> {
        let salt = record.salt.as_deref().ok_or(HandlerError::MissingSetting("salt"))?;
        let rounds = record.rounds.ok_or(HandlerError::MissingSetting("rounds"))?;

        let mut result = Md5::new().chain_update(salt).chain_update(secret).finalize();
        for _ in 0..(1u64 << rounds) {
            result = Md5::new().chain_update(result).chain_update(secret).finalize();
        }
        Ok(h64().encode_bytes(&result))
    }
}

pub fn phpass(_: &HandlerRegistry) -> Result<Arc<dyn HashHandler>> {
    Ok(Arc::new(Phpass::new()?))
}
