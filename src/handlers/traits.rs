use std::fmt;

use thiserror::Error;

use super::backends::Backends;
use super::idents::IdentSpec;
use super::rounds::RoundsSpec;
use super::salt::SaltSpec;
use super::types::{ChecksumSpec, HashRecord, Settings};
use crate::codec::CodecError;
use crate::registry::RegistryError;

/// Handler errors
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("not a valid {scheme} hash: {reason}")]
    InvalidHash { scheme: String, reason: String },

    #[error("{setting} out of range: {reason}")]
    OutOfRange { setting: &'static str, reason: String },

    #[error("{0} must be specified")]
    MissingSetting(&'static str),

    #[error("{scheme} does not support the {setting} setting")]
    UnsupportedSetting { scheme: String, setting: &'static str },

    #[error("invalid characters in {0}")]
    InvalidChars(&'static str),

    #[error("invalid ident {ident:?} for {scheme}")]
    InvalidIdent { scheme: String, ident: String },

    #[error("{scheme}: backend {backend:?} is not available")]
    MissingBackend { scheme: String, backend: String },

    #[error("{scheme}: unknown backend {backend:?}")]
    UnknownBackend { scheme: String, backend: String },

    #[error("backend {backend} failed: {reason}")]
    BackendFailure { backend: &'static str, reason: String },

    #[error("value is not valid UTF-8 text")]
    NotText,

    #[error("invalid handler definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl HandlerError {
    pub fn invalid_hash(scheme: &str, reason: impl Into<String>) -> Self {
        Self::InvalidHash {
            scheme: scheme.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(scheme: &str, setting: &'static str) -> Self {
        Self::UnsupportedSetting {
            scheme: scheme.to_string(),
            setting,
        }
    }
}

pub type Result<T> = std::result::Result<T, HandlerError>;

/// Password hash scheme contract
///
/// A handler only has to describe its string format (`parse`/`render`) and
/// its digest (`calc_checksum`). Settings normalization, hashing, verifying
/// and config generation are provided on top of the capability specs a
/// handler exposes (`salt_spec`, `rounds_spec`, `ident_spec`), so a scheme
/// gains salt/rounds/ident handling just by returning a spec.
pub trait HashHandler: Send + Sync + fmt::Debug {
    /// Unique registry name (lower-case, underscore separated)
    fn name(&self) -> &str;

    /// Fixed prefix identifying every hash of this scheme, if any
    fn ident(&self) -> Option<String> {
        None
    }

    fn ident_spec(&self) -> Option<&IdentSpec> {
        None
    }

    fn salt_spec(&self) -> Option<&SaltSpec> {
        None
    }

    fn rounds_spec(&self) -> Option<&RoundsSpec> {
        None
    }

    fn checksum_spec(&self) -> Option<&ChecksumSpec> {
        None
    }

    fn backends(&self) -> Option<&Backends> {
        None
    }

    /// Split a hash (or config) string into its settings and checksum
    fn parse(&self, hash: &str) -> Result<HashRecord>;

    /// Serialize a record back into the scheme's string format
    fn render(&self, record: &HashRecord) -> Result<String>;

    /// Compute the checksum for `secret` under the record's settings
    fn calc_checksum(&self, secret: &[u8], record: &HashRecord) -> Result<String>;

    /// Whether `hash` looks like it belongs to this scheme
    fn identify(&self, hash: &str) -> bool {
        if let Some(ident) = self.ident() {
            return hash.starts_with(&ident);
        }
        if let Some(spec) = self.ident_spec() {
            return spec.matching(hash).is_some();
        }
        self.parse(hash).is_ok()
    }

    /// Normalize settings into a record without a checksum
    fn configure(&self, settings: &Settings) -> Result<HashRecord> {
        let scheme = self.name();
        let mut record = HashRecord::default();

        match (self.ident_spec(), settings.ident.as_deref()) {
            (Some(spec), Some(ident)) => record.ident = Some(spec.normalize(scheme, ident)?),
            (Some(spec), None) if settings.use_defaults => {
                record.ident = Some(spec.default_ident().to_string())
            }
            (Some(_), None) => return Err(HandlerError::MissingSetting("ident")),
            (None, Some(_)) => return Err(HandlerError::unsupported(scheme, "ident")),
            (None, None) => {}
        }

        match self.salt_spec() {
            Some(spec) => record.salt = Some(spec.resolve(settings)?),
            None if settings.salt.is_some() || settings.salt_size.is_some() => {
                return Err(HandlerError::unsupported(scheme, "salt"));
            }
            None => {}
        }

        match self.rounds_spec() {
            Some(spec) => record.rounds = Some(spec.resolve(settings)?),
            None if settings.rounds.is_some() => {
                return Err(HandlerError::unsupported(scheme, "rounds"));
            }
            None => {}
        }

        Ok(record)
    }

    /// Hash `secret`, filling in any omitted settings with defaults
    fn hash(&self, secret: &[u8], settings: &Settings) -> Result<String> {
        let mut record = self.configure(&settings.with_defaults())?;
        record.checksum = Some(self.calc_checksum(secret, &record)?);
        self.render(&record)
    }

    /// Render a configuration string without computing a real digest
    ///
    /// Handlers with a fixed-size checksum alphabet get a placeholder
    /// checksum; others get the digest of the empty secret.
    fn genconfig(&self, settings: &Settings) -> Result<String> {
        let mut record = self.configure(&settings.with_defaults())?;
        let checksum = match self.checksum_spec().and_then(ChecksumSpec::placeholder) {
            Some(placeholder) => placeholder,
            None => self.calc_checksum(b"", &record)?,
        };
        record.checksum = Some(checksum);
        self.render(&record)
    }

    /// Hash `secret` reusing the settings embedded in `config`
    fn genhash(&self, secret: &[u8], config: &str) -> Result<String> {
        let mut record = self.parse(config)?;
        record.checksum = Some(self.calc_checksum(secret, &record)?);
        self.render(&record)
    }

    /// Check `secret` against `hash`
    fn verify(&self, secret: &[u8], hash: &str) -> Result<bool> {
        let record = self.parse(hash)?;
        let Some(expected) = record.checksum.as_deref() else {
            return Err(HandlerError::invalid_hash(self.name(), "missing checksum"));
        };
        let actual = self.calc_checksum(secret, &record)?;
        Ok(consteq(actual.as_bytes(), expected.as_bytes()))
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch
pub fn consteq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Borrow a byte hash as text, rejecting non-UTF-8 input
pub fn hash_from_bytes(hash: &[u8]) -> Result<&str> {
    std::str::from_utf8(hash).map_err(|_| HandlerError::NotText)
}
