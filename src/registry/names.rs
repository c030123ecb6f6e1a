use std::borrow::Cow;

use super::RegistryError;

/// Names that collide with policy keywords
const RESERVED_NAMES: &[&str] = &["all", "auto", "context", "default", "none", "onload", "policy"];

/// Check that `name` can be registered
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason| RegistryError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("name must be lower-case"));
    }
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(invalid("name may only contain a-z, 0-9 and underscores"));
    }
    let public = name.strip_prefix('_').unwrap_or(name);
    if !public.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("name must start with a letter"));
    }
    if public.len() < 3 {
        return Err(invalid("name must be at least three characters"));
    }
    if name.ends_with('_') {
        return Err(invalid("name cannot end with an underscore"));
    }
    if name.contains("__") {
        return Err(invalid("name may not contain double underscores"));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(invalid("name is reserved"));
    }
    Ok(())
}

/// Private names are registered but never resolved or listed
pub fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

/// Lower-case `name` and replace hyphens with underscores
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    if name.chars().any(|c| c == '-' || c.is_ascii_uppercase()) {
        Cow::Owned(name.replace('-', "_").to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}
