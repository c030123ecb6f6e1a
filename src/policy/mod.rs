//! Hashing policy for a [`CryptContext`](crate::context::CryptContext)
//!
//! A policy selects the schemes a context knows, the default scheme, the
//! deprecated schemes, and per-scheme options. Options are scoped:
//!
//! 1. `all.<option>` applies to every scheme
//! 2. `<scheme>.<option>` overrides `all` for one scheme
//! 3. `<category>.all.<option>` and `<category>.<scheme>.<option>` layer the
//!    same way over the global scope for one category of users
//!
//! # Usage
//!
//! ```
//! use passkit::policy::{Policy, PolicySource};
//!
//! let policy = Policy::from_source(PolicySource::Text(
//!     "[passlib]\nschemes = pbkdf2_sha256, hex_md5\ndeprecated = hex_md5\n".to_string(),
//! ))
//! .unwrap();
//! assert!(policy.handler_is_deprecated("hex_md5", None));
//! assert_eq!(policy.default_scheme(None), None);
//! ```
//!
//! # Environment Variables
//!
//! [`Policy::load`] reads `config/passkit.ini` (or `PASSKIT_POLICY`) and
//! overlays variables of the form `PASSKIT__PASSLIB__<key>`, e.g.
//! `PASSKIT__PASSLIB__ALL__VARY_ROUNDS=0.1`.

mod models;
mod resolver;
mod sources;
mod validation;

pub use models::{OPTION_NAMES, PolicyValue, SchemeOptions, ScopeConfig, VaryRounds};
pub use resolver::{EffectiveOptions, RoundsWindow};
pub use validation::{ContextKey, PolicyKey, parse_key};

use std::collections::BTreeMap;
use std::path::PathBuf;

use config::FileFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to load policy: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Policy text is not correctly encoded: {0}")]
    Encoding(String),

    #[error("Invalid policy key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Unknown policy option: {0}")]
    UnknownOption(String),

    #[error("{0}: salt cannot be set by a policy")]
    ForbiddenOption(String),

    #[error("{0}: schemes cannot be set per category")]
    CategorySchemes(String),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown policy section: {0}")]
    UnknownSection(String),

    #[error("{kind} scheme {scheme:?} is not in the schemes list")]
    UnknownScheme { kind: &'static str, scheme: String },

    #[error("Scheme {0:?} is listed more than once")]
    DuplicateScheme(String),

    #[error("At least one policy source is required")]
    NoSources,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::ser::Error),
}

impl PolicyError {
    pub fn invalid_value(key: &str, value: &PolicyValue, reason: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;

/// Encoding of policy bytes read from a file or buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Byte order from the BOM, little-endian without one
    Utf16,
}

/// Where a policy layer comes from
#[derive(Debug, Clone)]
pub enum PolicySource {
    /// INI (or TOML for `.toml`) file
    Path {
        path: PathBuf,
        encoding: TextEncoding,
    },
    /// INI text with a `[passlib]` section
    Text(String),
    /// TOML text with a `[passlib]` table
    Toml(String),
    /// Encoded INI text
    Bytes {
        data: Vec<u8>,
        encoding: TextEncoding,
    },
    /// Flat `key -> value` mapping
    Map(BTreeMap<String, PolicyValue>),
    /// JSON object; nested objects are flattened to dotted keys
    Json(serde_json::Value),
    Policy(Policy),
}

impl PolicySource {
    /// UTF-8 file source
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path {
            path: path.into(),
            encoding: TextEncoding::Utf8,
        }
    }
}

impl From<Policy> for PolicySource {
    fn from(policy: Policy) -> Self {
        Self::Policy(policy)
    }
}

impl From<BTreeMap<String, PolicyValue>> for PolicySource {
    fn from(map: BTreeMap<String, PolicyValue>) -> Self {
        Self::Map(map)
    }
}

/// Immutable, validated policy
///
/// Build with [`Policy::from_source`] / [`Policy::from_sources`], derive new
/// policies with [`Policy::overlay`] / [`Policy::replace`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policy {
    schemes: Vec<String>,
    global: ScopeConfig,
    categories: BTreeMap<String, ScopeConfig>,
}

impl Policy {
    /// Load from the policy file and environment (see module docs)
    pub fn load() -> Result<Self> {
        sources::load()
    }

    /// Build a policy from raw `key = value` entries
    pub fn from_entries<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, PolicyValue)>,
        K: AsRef<str>,
    {
        let mut policy = Self::default();
        for (key, value) in entries {
            policy.set(key.as_ref(), &value)?;
        }
        validation::validate(&policy)?;
        Ok(policy)
    }

    pub fn from_source(source: PolicySource) -> Result<Self> {
        match source {
            PolicySource::Path { path, encoding } => {
                Self::from_entries(sources::read_path(&path, encoding)?)
            }
            PolicySource::Text(text) => {
                Self::from_entries(sources::parse_text(&text, FileFormat::Ini)?)
            }
            PolicySource::Toml(text) => {
                Self::from_entries(sources::parse_text(&text, FileFormat::Toml)?)
            }
            PolicySource::Bytes { data, encoding } => {
                let text = sources::decode_text(&data, encoding)?;
                Self::from_entries(sources::parse_text(&text, FileFormat::Ini)?)
            }
            PolicySource::Map(map) => Self::from_entries(map),
            PolicySource::Json(value) => Self::from_entries(json_entries(value)?),
            PolicySource::Policy(policy) => Ok(policy),
        }
    }

    /// Merge sources left to right; later sources win
    pub fn from_sources<I>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = PolicySource>,
    {
        let mut sources = sources.into_iter();
        let first = sources.next().ok_or(PolicyError::NoSources)?;
        sources.try_fold(Self::from_source(first)?, |policy, source| {
            policy.overlay(&Self::from_source(source)?)
        })
    }

    /// New policy with `other` layered over this one
    ///
    /// The scheme list, defaults and deprecated lists are replaced when
    /// `other` sets them; options merge key by key.
    pub fn overlay(&self, other: &Policy) -> Result<Policy> {
        let mut merged = self.clone();
        if !other.schemes.is_empty() {
            merged.schemes = other.schemes.clone();
        }
        merged.global.merge(&other.global);
        for (category, scope) in &other.categories {
            merged.categories.entry(category.clone()).or_default().merge(scope);
        }
        validation::validate(&merged)?;
        Ok(merged)
    }

    pub fn replace(&self, source: PolicySource) -> Result<Policy> {
        self.overlay(&Self::from_source(source)?)
    }

    fn set(&mut self, key: &str, value: &PolicyValue) -> Result<()> {
        match parse_key(key)? {
            PolicyKey::Context {
                key: ContextKey::Schemes,
                ..
            } => self.schemes = value.to_list(key)?,
            PolicyKey::Context {
                category,
                key: ContextKey::Default,
            } => self.scope_mut(category).default = Some(value.to_text(key)?),
            PolicyKey::Context {
                category,
                key: ContextKey::Deprecated,
            } => self.scope_mut(category).deprecated = Some(value.to_list(key)?),
            PolicyKey::Option {
                category,
                scheme,
                option,
            } => self.scope_mut(category).options_mut(&scheme).set(&option, key, value)?,
        }
        Ok(())
    }

    fn scope_mut(&mut self, category: Option<String>) -> &mut ScopeConfig {
        match category {
            Some(category) => self.categories.entry(category).or_default(),
            None => &mut self.global,
        }
    }

    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    pub fn has_schemes(&self) -> bool {
        !self.schemes.is_empty()
    }

    /// Categories with their own settings
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Configured default: the category's, else the global one
    pub fn default_scheme(&self, category: Option<&str>) -> Option<&str> {
        category
            .and_then(|category| self.categories.get(category))
            .and_then(|scope| scope.default.as_deref())
            .or(self.global.default.as_deref())
    }

    /// Deprecated schemes; a category list replaces the global one
    pub fn deprecated(&self, category: Option<&str>) -> &[String] {
        category
            .and_then(|category| self.categories.get(category))
            .and_then(|scope| scope.deprecated.as_deref())
            .or(self.global.deprecated.as_deref())
            .unwrap_or_default()
    }

    pub fn handler_is_deprecated(&self, scheme: &str, category: Option<&str>) -> bool {
        self.deprecated(category).iter().any(|s| s == scheme)
    }

    /// Effective options for `scheme` in `category`
    ///
    /// Layered from lowest to highest priority: global `all`, global
    /// scheme, category `all`, category scheme.
    pub fn options(&self, scheme: &str, category: Option<&str>) -> SchemeOptions {
        let mut options = SchemeOptions::default();
        let mut apply = |scope: &ScopeConfig| {
            options.merge(&scope.all);
            if let Some(specific) = scope.schemes.get(scheme) {
                options.merge(specific);
            }
        };
        apply(&self.global);
        if let Some(scope) = category.and_then(|category| self.categories.get(category)) {
            apply(scope);
        }
        options
    }

    /// Entries in a stable order that reads back into an equal policy
    pub fn entries(&self) -> Vec<(String, PolicyValue)> {
        let mut entries = Vec::new();
        if !self.schemes.is_empty() {
            entries.push(("schemes".to_string(), PolicyValue::from(self.schemes.clone())));
        }
        scope_entries(&mut entries, None, &self.global);
        for (category, scope) in &self.categories {
            scope_entries(&mut entries, Some(category), scope);
        }
        entries
    }

    /// Dotted keys, e.g. `all.vary_rounds` or `admin.context.deprecated`
    pub fn to_map(&self) -> BTreeMap<String, PolicyValue> {
        self.entries().into_iter().collect()
    }

    /// INI text with a `[passlib]` section
    pub fn to_ini_string(&self) -> String {
        sources::render_ini(&self.entries())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        sources::render_toml(&self.entries())
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.to_map())?)
    }
}

fn scope_entries(entries: &mut Vec<(String, PolicyValue)>, category: Option<&str>, scope: &ScopeConfig) {
    let (context, prefix) = match category {
        Some(category) => (format!("{category}.context."), format!("{category}.")),
        None => (String::new(), String::new()),
    };
    if let Some(default) = &scope.default {
        entries.push((format!("{context}default"), PolicyValue::from(default.as_str())));
    }
    if let Some(deprecated) = &scope.deprecated {
        entries.push((format!("{context}deprecated"), PolicyValue::from(deprecated.clone())));
    }
    for (option, value) in scope.all.entries() {
        entries.push((format!("{prefix}all.{option}"), value));
    }
    for (scheme, options) in &scope.schemes {
        for (option, value) in options.entries() {
            entries.push((format!("{prefix}{scheme}.{option}"), value));
        }
    }
}

fn json_entries(value: serde_json::Value) -> Result<Vec<(String, PolicyValue)>> {
    let serde_json::Value::Object(object) = value else {
        return Err(PolicyError::InvalidValue {
            key: String::new(),
            value: value.to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };
    let mut entries = Vec::new();
    flatten_json(String::new(), object, &mut entries)?;
    Ok(entries)
}

fn flatten_json(
    prefix: String,
    object: serde_json::Map<String, serde_json::Value>,
    entries: &mut Vec<(String, PolicyValue)>,
) -> Result<()> {
    for (key, value) in object {
        let key = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            serde_json::Value::Object(inner) => flatten_json(key, inner, entries)?,
            value => {
                let value = serde_json::from_value(value)?;
                entries.push((key, value));
            }
        }
    }
    Ok(())
}
