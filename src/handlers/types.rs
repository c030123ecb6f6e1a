use bon::Builder;

use super::traits::{HandlerError, Result};

/// Caller-supplied settings for `hash`/`genconfig`/`configure`
///
/// ```rust
/// use passkit::handlers::Settings;
///
/// let settings = Settings::builder().rounds(10).ident("$H$").build();
/// assert_eq!(settings.rounds, Some(10));
/// assert!(!settings.use_defaults);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct Settings {
    #[builder(into)]
    pub salt: Option<String>,
    pub salt_size: Option<usize>,
    pub rounds: Option<u32>,
    #[builder(into)]
    pub ident: Option<String>,
    /// Fill omitted settings with the scheme defaults instead of failing
    #[builder(default)]
    pub use_defaults: bool,
    /// Clamp out-of-range values with a warning instead of failing
    #[builder(default)]
    pub relaxed: bool,
}

impl Settings {
    pub fn with_defaults(&self) -> Self {
        Self {
            use_defaults: true,
            ..self.clone()
        }
    }
}

/// Parsed form of one hash string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashRecord {
    pub ident: Option<String>,
    pub salt: Option<String>,
    pub rounds: Option<u32>,
    pub checksum: Option<String>,
}

/// Shape of a scheme's checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumSpec {
    size: Option<usize>,
    chars: Option<&'static str>,
}

impl ChecksumSpec {
    pub fn new(size: Option<usize>, chars: Option<&'static str>) -> Result<Self> {
        if size == Some(0) {
            return Err(HandlerError::InvalidDefinition(
                "checksum size must be positive".to_string(),
            ));
        }
        if chars.is_some_and(str::is_empty) {
            return Err(HandlerError::InvalidDefinition(
                "checksum alphabet cannot be empty".to_string(),
            ));
        }
        Ok(Self { size, chars })
    }

    pub fn fixed(size: usize, chars: &'static str) -> Result<Self> {
        Self::new(Some(size), Some(chars))
    }

    pub fn size(&self) -> Option<usize> {
        self.size
    }

    pub fn chars(&self) -> Option<&'static str> {
        self.chars
    }

    /// Validate a checksum taken from a hash string
    pub fn normalize(&self, scheme: &str, checksum: &str) -> Result<String> {
        if let Some(size) = self.size {
            let actual = checksum.chars().count();
            if actual != size {
                return Err(HandlerError::invalid_hash(
                    scheme,
                    format!("checksum must be {size} chars, got {actual}"),
                ));
            }
        }
        if let Some(chars) = self.chars {
            if let Some(bad) = checksum.chars().find(|c| !chars.contains(*c)) {
                return Err(HandlerError::invalid_hash(
                    scheme,
                    format!("invalid character {bad:?} in checksum"),
                ));
            }
        }
        Ok(checksum.to_string())
    }

    /// First alphabet symbol repeated to the checksum size
    pub fn placeholder(&self) -> Option<String> {
        let first = self.chars?.chars().next()?;
        Some(std::iter::repeat_n(first, self.size?).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::LOWER_HEX_CHARS;

    #[test]
    fn test_settings_builder_defaults() {
        let settings = Settings::builder().build();
        assert_eq!(settings, Settings::default());
        assert!(settings.with_defaults().use_defaults);
    }

    #[test]
    fn test_checksum_normalize() {
        let spec = ChecksumSpec::fixed(4, LOWER_HEX_CHARS).unwrap();
        assert_eq!(spec.normalize("t", "00af").unwrap(), "00af");
        assert!(matches!(spec.normalize("t", "00a"), Err(HandlerError::InvalidHash { .. })));
        assert!(matches!(spec.normalize("t", "00aG"), Err(HandlerError::InvalidHash { .. })));
    }

    #[test]
    fn test_checksum_placeholder() {
        let spec = ChecksumSpec::fixed(4, LOWER_HEX_CHARS).unwrap();
        assert_eq!(spec.placeholder().as_deref(), Some("0000"));

        let open = ChecksumSpec::new(None, Some(LOWER_HEX_CHARS)).unwrap();
        assert_eq!(open.placeholder(), None);
    }

    #[test]
    fn test_checksum_rejects_bad_definition() {
        assert!(ChecksumSpec::new(Some(0), None).is_err());
        assert!(ChecksumSpec::new(None, Some("")).is_err());
    }
}
