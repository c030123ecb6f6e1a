use std::collections::BTreeMap;

use super::traits::{HandlerError, Result};

/// Identifier prefixes accepted by a multi-ident scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentSpec {
    values: Vec<String>,
    default: String,
    aliases: BTreeMap<String, String>,
}

impl IdentSpec {
    pub fn new<I, S>(values: I, default: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let default = default.into();

        if values.is_empty() || values.iter().any(String::is_empty) {
            return Err(HandlerError::InvalidDefinition(
                "ident values must be non-empty".to_string(),
            ));
        }
        if !values.contains(&default) {
            return Err(HandlerError::InvalidDefinition(format!(
                "default ident {default:?} is not one of {values:?}"
            )));
        }

        Ok(Self {
            values,
            default,
            aliases: BTreeMap::new(),
        })
    }

    /// Add convenience names mapping onto canonical idents
    pub fn with_aliases<I, A, T>(mut self, aliases: I) -> Result<Self>
    where
        I: IntoIterator<Item = (A, T)>,
        A: Into<String>,
        T: Into<String>,
    {
        for (alias, target) in aliases {
            let target = target.into();
            if !self.values.contains(&target) {
                return Err(HandlerError::InvalidDefinition(format!(
                    "ident alias target {target:?} is not a known ident"
                )));
            }
            self.aliases.insert(alias.into(), target);
        }
        Ok(self)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn default_ident(&self) -> &str {
        &self.default
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Canonical ident for `ident` (itself or via alias)
    pub fn normalize(&self, scheme: &str, ident: &str) -> Result<String> {
        if self.values.iter().any(|v| v == ident) {
            return Ok(ident.to_string());
        }
        self.aliases
            .get(ident)
            .cloned()
            .ok_or_else(|| HandlerError::InvalidIdent {
                scheme: scheme.to_string(),
                ident: ident.to_string(),
            })
    }

    /// The ident `hash` starts with, if any
    pub fn matching(&self, hash: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|ident| hash.starts_with(ident.as_str()))
            .map(String::as_str)
    }

    /// Same set of idents with every value rewritten through `f`
    pub fn map(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            values: self.values.iter().map(|v| f(v)).collect(),
            default: f(&self.default),
            aliases: BTreeMap::new(),
        }
    }
}
