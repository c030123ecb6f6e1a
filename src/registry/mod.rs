//! Scheme registry
//!
//! Maps scheme names to handlers. A name is either registered with a loaded
//! handler or lazily with a [`HandlerLocation`], in which case the handler is
//! loaded through the registry's [`ModuleSource`] on first resolution.
//!
//! ## Key Components
//!
//! - [`HandlerRegistry`] - Cheaply cloneable handle to one registry
//! - [`ModuleSource`] - Loads handlers from locations (replaces dynamic import)
//! - [`ModuleTable`] - Table-driven [`ModuleSource`]
//!
//! ## Example
//!
//! ```rust
//! use passkit::registry::HandlerRegistry;
//!
//! let registry = HandlerRegistry::with_builtins();
//! assert!(registry.has_handler("hex_md5", false));
//! assert!(!registry.has_handler("hex_md5", true));
//!
//! let handler = registry.resolve("hex_md5").unwrap();
//! assert_eq!(handler.name(), "hex_md5");
//! assert!(registry.has_handler("hex_md5", true));
//! ```

mod builtins;
mod location;
mod names;

pub use location::HandlerLocation;
pub use names::{is_private, normalize_name, validate_name};

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, OnceLock, Weak};
use thiserror::Error;

use crate::handlers::{HandlerError, HashHandler};

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("invalid handler name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("another handler is already registered as {0:?}")]
    NameCollision(String),

    #[error("handler loaded from {location} is named {found:?}, expected {expected:?}")]
    NameMismatch {
        expected: String,
        found: String,
        location: String,
    },

    #[error("unknown password hash scheme: {0:?}")]
    UnknownHandler(String),

    #[error("invalid handler location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: &'static str },

    #[error("module {0:?} not found")]
    ModuleNotFound(String),

    #[error("module {module:?} has no handler {attr:?}")]
    AttributeNotFound { module: String, attr: String },

    #[error("failed to load handler {name:?}")]
    LoadFailed {
        name: String,
        #[source]
        source: Box<HandlerError>,
    },

    #[error("handler registry is no longer available")]
    Unavailable,
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Builds a handler; receives the registry so wrappers can reference it
pub type HandlerFactory =
    fn(&HandlerRegistry) -> std::result::Result<Arc<dyn HashHandler>, HandlerError>;

/// Loads handlers named by a [`HandlerLocation`]
pub trait ModuleSource: Send + Sync {
    fn load(
        &self,
        module: &str,
        attr: &str,
        registry: &HandlerRegistry,
    ) -> Result<Arc<dyn HashHandler>>;
}

/// [`ModuleSource`] backed by a `(module, attr) -> factory` table
#[derive(Clone, Default)]
pub struct ModuleTable {
    modules: BTreeMap<String, BTreeMap<String, HandlerFactory>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every builtin scheme
    pub fn builtins() -> Self {
        builtins::module_table()
    }

    pub fn insert(&mut self, module: impl Into<String>, attr: impl Into<String>, factory: HandlerFactory) {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(attr.into(), factory);
    }

    pub fn with(mut self, module: impl Into<String>, attr: impl Into<String>, factory: HandlerFactory) -> Self {
        self.insert(module, attr, factory);
        self
    }
}

impl ModuleSource for ModuleTable {
    fn load(
        &self,
        module: &str,
        attr: &str,
        registry: &HandlerRegistry,
    ) -> Result<Arc<dyn HashHandler>> {
        let attrs = self
            .modules
            .get(module)
            .ok_or_else(|| RegistryError::ModuleNotFound(module.to_string()))?;
        let factory = attrs.get(attr).ok_or_else(|| RegistryError::AttributeNotFound {
            module: module.to_string(),
            attr: attr.to_string(),
        })?;
        factory(registry).map_err(|source| RegistryError::LoadFailed {
            name: attr.to_string(),
            source: Box::new(source),
        })
    }
}

type LoadCell = Arc<OnceLock<Result<Arc<dyn HashHandler>>>>;

struct Entry {
    location: Option<HandlerLocation>,
    cell: LoadCell,
}

impl Entry {
    fn loaded(&self) -> Option<&Arc<dyn HashHandler>> {
        self.cell.get().and_then(|result| result.as_ref().ok())
    }
}

struct Inner {
    entries: RwLock<BTreeMap<String, Entry>>,
    source: Arc<dyn ModuleSource>,
}

/// Registry mapping scheme names to handlers
///
/// Clones share the same underlying registry. Lazy entries are loaded at
/// most once, even under concurrent first resolution; a failed load is
/// cached and reported again until the entry is unloaded.
#[derive(Clone)]
pub struct HandlerRegistry {
    inner: Arc<Inner>,
}

/// Non-owning registry handle held by wrappers
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<Inner>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<HandlerRegistry> {
        self.inner.upgrade().map(|inner| HandlerRegistry { inner })
    }
}

static GLOBAL: LazyLock<HandlerRegistry> = LazyLock::new(HandlerRegistry::with_builtins);

impl HandlerRegistry {
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(BTreeMap::new()),
                source,
            }),
        }
    }

    /// Registry with no entries and an empty module table
    pub fn empty() -> Self {
        Self::new(Arc::new(ModuleTable::new()))
    }

    /// Registry with every builtin scheme registered lazily
    pub fn with_builtins() -> Self {
        let registry = Self::new(Arc::new(ModuleTable::builtins()));
        for (name, location) in builtins::BUILTIN_LOCATIONS {
            // builtin table entries are static and always valid
            if let Err(err) = registry.register_lazy(name, location) {
                tracing::error!(name, error = %err, "Invalid builtin registration");
            }
        }
        registry
    }

    /// Process-wide registry with builtins
    pub fn global() -> &'static HandlerRegistry {
        &GLOBAL
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a loaded handler under its own name
    ///
    /// Re-registering the same handler is a no-op. A different handler under
    /// an already loaded name is rejected unless `force` is set.
    pub fn register(&self, handler: Arc<dyn HashHandler>, force: bool) -> Result<()> {
        let name = handler.name().to_string();
        validate_name(&name)?;

        let mut entries = self.inner.entries.write();
        let location = match entries.get(&name) {
            Some(entry) => {
                if let Some(existing) = entry.loaded() {
                    if Arc::ptr_eq(existing, &handler) {
                        return Ok(());
                    }
                    if !force {
                        return Err(RegistryError::NameCollision(name));
                    }
                    tracing::warn!(name = %name, "Overriding previously registered handler");
                }
                entry.location.clone()
            }
            None => None,
        };

        tracing::debug!(name = %name, "Registered handler");
        entries.insert(
            name,
            Entry {
                location,
                cell: Arc::new(OnceLock::from(Ok(handler))),
            },
        );
        Ok(())
    }

    /// Register `name` to be loaded from `location` on first use
    ///
    /// An already loaded handler stays loaded; the location is only used
    /// after it is unloaded.
    pub fn register_lazy(&self, name: &str, location: &str) -> Result<()> {
        validate_name(name)?;
        let location = HandlerLocation::parse(location)?;

        let mut entries = self.inner.entries.write();
        match entries.get_mut(name) {
            Some(entry) if entry.loaded().is_some() => entry.location = Some(location),
            _ => {
                entries.insert(
                    name.to_string(),
                    Entry {
                        location: Some(location),
                        cell: Arc::new(OnceLock::new()),
                    },
                );
            }
        }
        tracing::debug!(name, "Registered lazy handler location");
        Ok(())
    }

    /// Resolve `name`, loading it if needed
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn HashHandler>> {
        self.resolve_optional(name)?
            .ok_or_else(|| RegistryError::UnknownHandler(name.to_string()))
    }

    /// Like [`resolve`](Self::resolve), but unknown names yield `None`
    ///
    /// Load failures and name mismatches are still errors.
    pub fn resolve_optional(&self, name: &str) -> Result<Option<Arc<dyn HashHandler>>> {
        if is_private(name) {
            return Ok(None);
        }

        let lookup = |key: &str| {
            self.inner
                .entries
                .read()
                .get(key)
                .map(|entry| (entry.cell.clone(), entry.location.clone()))
        };

        let (key, (cell, location)) = match lookup(name) {
            Some(found) => (name.to_string(), found),
            None => {
                let alt = normalize_name(name);
                if alt == name {
                    return Ok(None);
                }
                tracing::warn!(
                    "handler names should be lower-case and use underscores instead of hyphens: {name:?} => {alt:?}"
                );
                match lookup(alt.as_ref()) {
                    Some(found) => (alt.into_owned(), found),
                    None => return Ok(None),
                }
            }
        };

        let result = cell.get_or_init(|| self.load(&key, location.as_ref()));
        let handler = result.clone()?;

        // a module may register its own handler while being loaded
        if let Some(current) = self.loaded(&key) {
            if !Arc::ptr_eq(&current, &handler) {
                tracing::warn!(name = %key, "Handler module registered a different handler while loading");
                return Ok(Some(current));
            }
        }
        Ok(Some(handler))
    }

    fn loaded(&self, name: &str) -> Option<Arc<dyn HashHandler>> {
        self.inner.entries.read().get(name).and_then(Entry::loaded).cloned()
    }

    fn load(&self, name: &str, location: Option<&HandlerLocation>) -> Result<Arc<dyn HashHandler>> {
        let location = location.ok_or_else(|| RegistryError::UnknownHandler(name.to_string()))?;
        tracing::debug!(name, location = %location, "Loading handler");

        let handler = self
            .inner
            .source
            .load(location.module(), location.attr_or(name), self)?;

        if handler.name() != name {
            return Err(RegistryError::NameMismatch {
                expected: name.to_string(),
                found: handler.name().to_string(),
                location: location.to_string(),
            });
        }
        Ok(handler)
    }

    /// Whether `name` is registered (optionally: and already loaded)
    pub fn has_handler(&self, name: &str, loaded_only: bool) -> bool {
        let entries = self.inner.entries.read();
        match entries.get(name) {
            Some(entry) if loaded_only => entry.loaded().is_some(),
            Some(_) => true,
            None => false,
        }
    }

    /// Public handler names in sorted order
    pub fn list(&self, loaded_only: bool) -> Vec<String> {
        self.inner
            .entries
            .read()
            .iter()
            .filter(|(name, _)| !is_private(name))
            .filter(|(_, entry)| !loaded_only || entry.loaded().is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Forget the loaded handler for `name`, keeping a known location
    pub fn unload(&self, name: &str) -> bool {
        self.unload_handler(name, true)
    }

    /// Forget `name`; with `keep_location` it reverts to a lazy entry
    pub fn unload_handler(&self, name: &str, keep_location: bool) -> bool {
        let mut entries = self.inner.entries.write();
        let Some(entry) = entries.get_mut(name) else {
            return false;
        };
        match entry.location.clone() {
            Some(location) if keep_location => {
                *entry = Entry {
                    location: Some(location),
                    cell: Arc::new(OnceLock::new()),
                };
            }
            _ => {
                entries.remove(name);
            }
        }
        tracing::debug!(name, keep_location, "Unloaded handler");
        true
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
