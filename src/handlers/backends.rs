use std::fmt;

use parking_lot::RwLock;

use super::traits::{HandlerError, Result};
use super::types::HashRecord;

/// Checksum implementation: `(secret, record) -> checksum`
pub type BackendFn = fn(&[u8], &HashRecord) -> Result<String>;

/// One interchangeable checksum implementation
#[derive(Clone, Copy)]
pub struct Backend {
    name: &'static str,
    available: fn() -> bool,
    compute: BackendFn,
}

impl Backend {
    pub const fn new(name: &'static str, available: fn() -> bool, compute: BackendFn) -> Self {
        Self { name, available, compute }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_available(&self) -> bool {
        (self.available)()
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.name).finish()
    }
}

const ANY: &str = "any";
const DEFAULT: &str = "default";

/// Backend table of a multi-backend scheme
///
/// The active backend is process-wide state of the scheme. It is chosen
/// lazily (first available, in declaration order) on the first checksum
/// unless `set_backend` picked one. Concurrent `set_backend` calls with
/// different targets are last-writer-wins; a checksum already in flight
/// finishes on the backend it started with.
pub struct Backends {
    scheme: &'static str,
    candidates: Vec<Backend>,
    active: RwLock<Option<usize>>,
}

impl Backends {
    pub fn new(scheme: &'static str, candidates: Vec<Backend>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(HandlerError::InvalidDefinition(format!(
                "{scheme} declares no backends"
            )));
        }
        for (idx, backend) in candidates.iter().enumerate() {
            if backend.name == ANY || backend.name == DEFAULT {
                return Err(HandlerError::InvalidDefinition(format!(
                    "backend name {:?} is reserved",
                    backend.name
                )));
            }
            if candidates[..idx].iter().any(|b| b.name == backend.name) {
                return Err(HandlerError::InvalidDefinition(format!(
                    "duplicate backend {:?}",
                    backend.name
                )));
            }
        }
        Ok(Self {
            scheme,
            candidates,
            active: RwLock::new(None),
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.candidates.iter().map(Backend::name).collect()
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.candidates
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| HandlerError::UnknownBackend {
                scheme: self.scheme.to_string(),
                backend: name.to_string(),
            })
    }

    /// Probe availability without changing the active backend
    ///
    /// `None`, `"any"` and `"default"` ask whether any backend is usable.
    pub fn has_backend(&self, name: Option<&str>) -> Result<bool> {
        match name {
            None | Some(ANY) | Some(DEFAULT) => {
                Ok(self.candidates.iter().any(Backend::is_available))
            }
            Some(name) => self.position(name).map(|idx| self.candidates[idx].is_available()),
        }
    }

    /// Name of the active backend, selecting one if none is active yet
    pub fn get_backend(&self) -> Result<&'static str> {
        if let Some(idx) = *self.active.read() {
            return Ok(self.candidates[idx].name);
        }
        self.set_backend(ANY)
    }

    /// Select a backend by name, or the first available for `"any"`/`"default"`
    pub fn set_backend(&self, name: &str) -> Result<&'static str> {
        let idx = match name {
            ANY | DEFAULT => self
                .candidates
                .iter()
                .position(Backend::is_available)
                .ok_or_else(|| HandlerError::MissingBackend {
                    scheme: self.scheme.to_string(),
                    backend: name.to_string(),
                })?,
            name => {
                let idx = self.position(name)?;
                if !self.candidates[idx].is_available() {
                    return Err(HandlerError::MissingBackend {
                        scheme: self.scheme.to_string(),
                        backend: name.to_string(),
                    });
                }
                idx
            }
        };

        let backend = self.candidates[idx].name;
        *self.active.write() = Some(idx);
        tracing::debug!(scheme = self.scheme, backend, "Backend selected");
        Ok(backend)
    }

    /// Run the active backend
    pub fn compute(&self, secret: &[u8], record: &HashRecord) -> Result<String> {
        let name = self.get_backend()?;
        let idx = self.position(name)?;
        (self.candidates[idx].compute)(secret, record)
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("scheme", &self.scheme)
            .field("candidates", &self.names())
            .field("active", &self.active.read().map(|idx| self.candidates[idx].name))
            .finish()
    }
}
