use rand::{Rng, RngCore};

use super::traits::{HandlerError, Result};
use super::types::Settings;
use crate::codec::Base64Engine;

/// Salt capability of a scheme
///
/// Sizes count salt characters, or raw bytes when the salt is stored
/// encoded through a [`Base64Engine`] (see [`SaltSpec::encoded`]).
#[derive(Debug, Clone)]
pub struct SaltSpec {
    min_size: usize,
    max_size: Option<usize>,
    default_size: usize,
    chars: &'static str,
    encoding: Option<&'static Base64Engine>,
}

impl SaltSpec {
    pub fn new(
        min_size: usize,
        max_size: Option<usize>,
        default_size: usize,
        chars: &'static str,
    ) -> Result<Self> {
        if chars.is_empty() || !chars.is_ascii() {
            return Err(HandlerError::InvalidDefinition(
                "salt alphabet must be non-empty ASCII".to_string(),
            ));
        }
        if default_size < min_size || max_size.is_some_and(|max| default_size > max) {
            return Err(HandlerError::InvalidDefinition(format!(
                "default salt size {default_size} outside [{min_size}, {}]",
                max_size.map_or("unbounded".to_string(), |max| max.to_string())
            )));
        }
        Ok(Self {
            min_size,
            max_size,
            default_size,
            chars,
            encoding: None,
        })
    }

    /// Salt made of raw bytes, stored in hash strings through `engine`
    pub fn encoded(
        min_size: usize,
        max_size: Option<usize>,
        default_size: usize,
        engine: &'static Base64Engine,
    ) -> Result<Self> {
        let mut spec = Self::new(min_size, max_size, default_size, engine.alphabet())?;
        spec.encoding = Some(engine);
        Ok(spec)
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn default_size(&self) -> usize {
        self.default_size
    }

    pub fn chars(&self) -> &'static str {
        self.chars
    }

    /// Validate a requested salt size
    pub fn clamp_size(&self, size: usize, relaxed: bool) -> Result<usize> {
        if size < self.min_size {
            let reason = format!("salt_size {size} below minimum {}", self.min_size);
            if !relaxed {
                return Err(HandlerError::OutOfRange { setting: "salt_size", reason });
            }
            tracing::warn!("{reason}, using {}", self.min_size);
            return Ok(self.min_size);
        }
        if let Some(max) = self.max_size.filter(|max| size > *max) {
            let reason = format!("salt_size {size} above maximum {max}");
            if !relaxed {
                return Err(HandlerError::OutOfRange { setting: "salt_size", reason });
            }
            tracing::warn!("{reason}, using {max}");
            return Ok(max);
        }
        Ok(size)
    }

    /// Generate a random salt of `size` chars (or bytes)
    pub fn generate(&self, size: usize) -> String {
        let mut rng = rand::thread_rng();
        match self.encoding {
            Some(engine) => {
                let mut raw = vec![0u8; size];
                rng.fill_bytes(&mut raw);
                engine.encode_bytes(&raw)
            }
            None => {
                let chars = self.chars.as_bytes();
                (0..size)
                    .map(|_| chars[rng.gen_range(0..chars.len())] as char)
                    .collect()
            }
        }
    }

    /// Validate an explicit salt
    ///
    /// A salt that is too short always fails. One that is too long is
    /// truncated in relaxed mode.
    pub fn normalize(&self, salt: &str, relaxed: bool) -> Result<String> {
        match self.encoding {
            Some(engine) => {
                let raw = engine.decode_bytes(salt)?;
                let len = self.check_length(raw.len(), relaxed)?;
                Ok(engine.encode_bytes(&raw[..len]))
            }
            None => {
                if salt.chars().any(|c| !self.chars.contains(c)) {
                    return Err(HandlerError::InvalidChars("salt"));
                }
                let len = self.check_length(salt.len(), relaxed)?;
                Ok(salt[..len].to_string())
            }
        }
    }

    fn check_length(&self, len: usize, relaxed: bool) -> Result<usize> {
        if len < self.min_size {
            return Err(HandlerError::OutOfRange {
                setting: "salt",
                reason: format!("salt too small (requires at least {} chars)", self.min_size),
            });
        }
        match self.max_size {
            Some(max) if len > max => {
                let reason = format!("salt too large (allows at most {max} chars)");
                if !relaxed {
                    return Err(HandlerError::OutOfRange { setting: "salt", reason });
                }
                tracing::warn!("{reason}, truncating");
                Ok(max)
            }
            _ => Ok(len),
        }
    }

    /// Salt for a new record: explicit, generated, or an error
    pub fn resolve(&self, settings: &Settings) -> Result<String> {
        if let Some(salt) = settings.salt.as_deref() {
            return self.normalize(salt, settings.relaxed);
        }
        if !settings.use_defaults {
            return Err(HandlerError::MissingSetting("salt"));
        }
        let size = match settings.salt_size {
            Some(size) => self.clamp_size(size, settings.relaxed)?,
            None => self.default_size,
        };
        Ok(self.generate(size))
    }
}
