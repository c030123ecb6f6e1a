use std::fmt;
use std::sync::{Arc, OnceLock};

use super::backends::Backends;
use super::idents::IdentSpec;
use super::rounds::RoundsSpec;
use super::salt::SaltSpec;
use super::traits::{HandlerError, HashHandler, Result};
use super::types::{ChecksumSpec, HashRecord, Settings};
use crate::registry::{validate_name, HandlerRegistry, RegistryError, WeakRegistry};

/// How a [`PrefixWrapper`] reports its `ident`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentOverride {
    /// Prefix + wrapped ident, unless `orig_prefix` is set
    #[default]
    Auto,
    /// The wrapper's own prefix (requires a non-empty prefix)
    Prefix,
    /// An explicit ident, which must agree with the prefix
    Custom(String),
}

enum Target {
    Named { name: String, registry: WeakRegistry },
    Explicit,
}

/// Handler that reuses another scheme under a different prefix
///
/// Hashes are produced by the wrapped handler, then `orig_prefix` is swapped
/// for `prefix`. Parsing does the reverse. The wrapped handler is resolved
/// through the registry on first use (or at construction for
/// [`eager`](Self::eager)) and never re-resolved afterwards.
pub struct PrefixWrapper {
    name: String,
    prefix: String,
    orig_prefix: String,
    target: Target,
    wrapped: OnceLock<Arc<dyn HashHandler>>,
    ident: Option<String>,
    ident_spec: OnceLock<Option<IdentSpec>>,
}

impl PrefixWrapper {
    /// Wrapper resolving `wrapped` from `registry` on first use
    pub fn lazy(
        name: impl Into<String>,
        wrapped: impl Into<String>,
        prefix: impl Into<String>,
        orig_prefix: impl Into<String>,
        registry: &HandlerRegistry,
    ) -> Result<Self> {
        let target = Target::Named {
            name: wrapped.into(),
            registry: registry.downgrade(),
        };
        Self::build(name.into(), target, prefix.into(), orig_prefix.into())
    }

    /// Wrapper resolving `wrapped` immediately
    pub fn eager(
        name: impl Into<String>,
        wrapped: impl Into<String>,
        prefix: impl Into<String>,
        orig_prefix: impl Into<String>,
        registry: &HandlerRegistry,
    ) -> Result<Self> {
        let wrapper = Self::lazy(name, wrapped, prefix, orig_prefix, registry)?;
        wrapper.wrapped()?;
        Ok(wrapper)
    }

    /// Wrapper around an already resolved handler
    pub fn explicit(
        name: impl Into<String>,
        wrapped: Arc<dyn HashHandler>,
        prefix: impl Into<String>,
        orig_prefix: impl Into<String>,
    ) -> Result<Self> {
        let wrapper = Self::build(name.into(), Target::Explicit, prefix.into(), orig_prefix.into())?;
        wrapper.check_wrapped(wrapped.as_ref());
        // freshly built, so the cell is empty
        let _ = wrapper.wrapped.set(wrapped);
        Ok(wrapper)
    }

    fn build(name: String, target: Target, prefix: String, orig_prefix: String) -> Result<Self> {
        validate_name(&name)?;
        Ok(Self {
            name,
            prefix,
            orig_prefix,
            target,
            wrapped: OnceLock::new(),
            ident: None,
            ident_spec: OnceLock::new(),
        })
    }

    /// Override the reported ident
    pub fn with_ident(mut self, ident: IdentOverride) -> Result<Self> {
        self.ident = match ident {
            IdentOverride::Auto => None,
            IdentOverride::Prefix if self.prefix.is_empty() => {
                return Err(HandlerError::InvalidDefinition(
                    "ident cannot default to an empty prefix".to_string(),
                ));
            }
            IdentOverride::Prefix => Some(self.prefix.clone()),
            IdentOverride::Custom(ident) => {
                if !(self.prefix.starts_with(&ident) || ident.starts_with(&self.prefix)) {
                    return Err(HandlerError::InvalidDefinition(format!(
                        "ident {ident:?} must agree with prefix {:?}",
                        self.prefix
                    )));
                }
                Some(ident)
            }
        };
        Ok(self)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn orig_prefix(&self) -> &str {
        &self.orig_prefix
    }

    /// Registry name of the wrapped handler, for named wrappers
    pub fn wrapped_name(&self) -> Option<&str> {
        match &self.target {
            Target::Named { name, .. } => Some(name),
            Target::Explicit => None,
        }
    }

    /// Whether the wrapped handler has been resolved
    pub fn is_resolved(&self) -> bool {
        self.wrapped.get().is_some()
    }

    /// The wrapped handler, resolving it on first call
    pub fn wrapped(&self) -> Result<&Arc<dyn HashHandler>> {
        if let Some(handler) = self.wrapped.get() {
            return Ok(handler);
        }

        let Target::Named { name, registry } = &self.target else {
            return Err(RegistryError::Unavailable.into());
        };
        let handler = registry
            .upgrade()
            .ok_or(RegistryError::Unavailable)?
            .resolve(name)?;
        self.check_wrapped(handler.as_ref());
        Ok(self.wrapped.get_or_init(|| handler))
    }

    fn check_wrapped(&self, handler: &dyn HashHandler) {
        if !self.orig_prefix.is_empty() && handler.ident_spec().is_some() {
            tracing::warn!(
                wrapper = %self.name,
                wrapped = handler.name(),
                "orig_prefix with a multi-ident handler may not work correctly"
            );
        }
    }

    fn wrap_hash(&self, hash: &str) -> Result<String> {
        let rest = hash.strip_prefix(self.orig_prefix.as_str()).ok_or_else(|| {
            HandlerError::invalid_hash(
                &self.name,
                format!("wrapped hash does not start with {:?}", self.orig_prefix),
            )
        })?;
        Ok(format!("{}{}", self.prefix, rest))
    }

    fn unwrap_hash(&self, hash: &str) -> Result<String> {
        let rest = hash.strip_prefix(self.prefix.as_str()).ok_or_else(|| {
            HandlerError::invalid_hash(&self.name, format!("hash does not start with {:?}", self.prefix))
        })?;
        Ok(format!("{}{}", self.orig_prefix, rest))
    }
}

impl HashHandler for PrefixWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn ident(&self) -> Option<String> {
        if self.ident.is_some() {
            return self.ident.clone();
        }
        if !self.orig_prefix.is_empty() {
            return None;
        }
        let ident = self.wrapped().ok()?.ident()?;
        Some(format!("{}{}", self.prefix, ident))
    }

    fn ident_spec(&self) -> Option<&IdentSpec> {
        if !self.orig_prefix.is_empty() {
            return None;
        }
        let wrapped = self.wrapped().ok()?;
        self.ident_spec
            .get_or_init(|| {
                wrapped
                    .ident_spec()
                    .map(|spec| spec.map(|ident| format!("{}{}", self.prefix, ident)))
            })
            .as_ref()
    }

    fn salt_spec(&self) -> Option<&SaltSpec> {
        self.wrapped().ok()?.salt_spec()
    }

    fn rounds_spec(&self) -> Option<&RoundsSpec> {
        self.wrapped().ok()?.rounds_spec()
    }

    fn checksum_spec(&self) -> Option<&ChecksumSpec> {
        self.wrapped().ok()?.checksum_spec()
    }

    fn backends(&self) -> Option<&Backends> {
        self.wrapped().ok()?.backends()
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let inner = self.unwrap_hash(hash)?;
        self.wrapped()?.parse(&inner)
    }

    fn render(&self, record: &HashRecord) -> Result<String> {
        let inner = self.wrapped()?.render(record)?;
        self.wrap_hash(&inner)
    }

    fn calc_checksum(&self, secret: &[u8], record: &HashRecord) -> Result<String> {
        self.wrapped()?.calc_checksum(secret, record)
    }

    fn identify(&self, hash: &str) -> bool {
        let Ok(inner) = self.unwrap_hash(hash) else {
            return false;
        };
        self.wrapped().is_ok_and(|wrapped| wrapped.identify(&inner))
    }

    fn configure(&self, settings: &Settings) -> Result<HashRecord> {
        self.wrapped()?.configure(settings)
    }
}

impl fmt::Debug for PrefixWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrapped = match (&self.target, self.wrapped.get()) {
            (Target::Named { name, .. }, _) => name.as_str(),
            (Target::Explicit, Some(handler)) => handler.name(),
            (Target::Explicit, None) => "?",
        };
        write!(f, "PrefixWrapper({:?}, {:?}, prefix={:?}", self.name, wrapped, self.prefix)?;
        if !self.orig_prefix.is_empty() {
            write!(f, ", orig_prefix={:?}", self.orig_prefix)?;
        }
        f.write_str(")")
    }
}
