use std::fmt;
use std::str::FromStr;

use super::RegistryError;

/// Where a lazily registered handler lives: `module.path[:attr]`
///
/// `attr` defaults to the registered scheme name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerLocation {
    module: String,
    attr: Option<String>,
}

impl HandlerLocation {
    pub fn new(module: impl Into<String>, attr: Option<String>) -> Self {
        Self {
            module: module.into(),
            attr,
        }
    }

    pub fn parse(path: &str) -> Result<Self, RegistryError> {
        let invalid = |reason| RegistryError::InvalidLocation {
            location: path.to_string(),
            reason,
        };

        if path.starts_with('.') {
            return Err(invalid("relative module paths are not supported"));
        }

        let mut parts = path.split(':');
        let module = parts.next().unwrap_or_default();
        let attr = parts.next();
        if parts.next().is_some() {
            return Err(invalid("expected at most one ':'"));
        }
        if module.is_empty() {
            return Err(invalid("module path cannot be empty"));
        }

        let attr = match attr {
            Some("") => return Err(invalid("attribute name cannot be empty")),
            Some(attr) if attr.contains('.') => {
                return Err(invalid("attribute name cannot be dotted"));
            }
            Some(attr) => Some(attr.to_string()),
            None => None,
        };

        Ok(Self {
            module: module.to_string(),
            attr,
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn attr(&self) -> Option<&str> {
        self.attr.as_deref()
    }

    /// Attribute to load for a handler registered as `name`
    pub fn attr_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.attr.as_deref().unwrap_or(name)
    }
}

impl FromStr for HandlerLocation {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HandlerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attr {
            Some(attr) => write!(f, "{}:{}", self.module, attr),
            None => f.write_str(&self.module),
        }
    }
}
