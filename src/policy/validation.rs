use std::collections::HashSet;

use super::models::OPTION_NAMES;
use super::{Policy, PolicyError, ScopeConfig};

/// Context-level keys (`schemes`, `default`, `deprecated`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKey {
    Schemes,
    Default,
    Deprecated,
}

/// A policy key split into its scope and target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyKey {
    Context {
        category: Option<String>,
        key: ContextKey,
    },
    Option {
        category: Option<String>,
        scheme: String,
        option: String,
    },
}

/// Parse `[category.]scheme_or_all.option` or `[category.]context.key`
///
/// Components may be separated by `.` or `__`. A leading `default`
/// category addresses the global scope.
pub fn parse_key(key: &str) -> Result<PolicyKey, PolicyError> {
    let invalid = |reason: &str| PolicyError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let normalized = key.trim().replace("__", ".");
    let mut parts: Vec<&str> = normalized.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(invalid("empty key component"));
    }
    if parts.len() > 3 {
        return Err(invalid("keys have at most three components"));
    }
    if parts.len() > 1 && parts[0] == "default" {
        parts.remove(0);
    }

    let (category, scheme, name) = match parts.as_slice() {
        [name] => (None, "context", *name),
        [scheme, name] => (None, *scheme, *name),
        [category, scheme, name] => (Some(category.to_string()), *scheme, *name),
        _ => return Err(invalid("empty key")),
    };

    if scheme == "context" {
        let context_key = match name {
            "schemes" if category.is_some() => {
                return Err(PolicyError::CategorySchemes(key.to_string()));
            }
            "schemes" => ContextKey::Schemes,
            "default" => ContextKey::Default,
            "deprecated" => ContextKey::Deprecated,
            _ => return Err(PolicyError::UnknownOption(key.to_string())),
        };
        return Ok(PolicyKey::Context {
            category,
            key: context_key,
        });
    }

    if name == "salt" {
        return Err(PolicyError::ForbiddenOption(key.to_string()));
    }
    if !OPTION_NAMES.contains(&name) {
        return Err(PolicyError::UnknownOption(key.to_string()));
    }
    Ok(PolicyKey::Option {
        category,
        scheme: scheme.to_string(),
        option: name.to_string(),
    })
}

/// Cross-field checks run after every construction and overlay
pub fn validate(policy: &Policy) -> Result<(), PolicyError> {
    let mut seen = HashSet::new();
    for scheme in &policy.schemes {
        if !seen.insert(scheme.as_str()) {
            return Err(PolicyError::DuplicateScheme(scheme.clone()));
        }
    }

    validate_scope_options(None, &policy.global)?;
    for (category, scope) in &policy.categories {
        validate_scope_options(Some(category), scope)?;
    }

    // partial policies (no scheme list) are only checked once overlaid
    if policy.schemes.is_empty() {
        return Ok(());
    }

    validate_scope_schemes(policy, None)?;
    for category in policy.categories.keys() {
        validate_scope_schemes(policy, Some(category))?;
    }
    Ok(())
}

fn validate_scope_schemes(policy: &Policy, category: Option<&str>) -> Result<(), PolicyError> {
    let scope = match category {
        Some(category) => policy.categories.get(category),
        None => Some(&policy.global),
    };
    let Some(scope) = scope else {
        return Ok(());
    };

    let known = |kind: &'static str, scheme: &str| {
        if policy.schemes.iter().any(|s| s == scheme) {
            Ok(())
        } else {
            Err(PolicyError::UnknownScheme {
                kind,
                scheme: scheme.to_string(),
            })
        }
    };

    if let Some(default) = &scope.default {
        known("default", default)?;
    }
    for scheme in scope.deprecated.iter().flatten() {
        known("deprecated", scheme)?;
    }
    Ok(())
}

fn validate_scope_options(category: Option<&str>, scope: &ScopeConfig) -> Result<(), PolicyError> {
    let prefix = category.map(|c| format!("{c}.")).unwrap_or_default();
    let all = std::iter::once(("all", &scope.all));
    let schemes = scope.schemes.iter().map(|(name, options)| (name.as_str(), options));

    for (scheme, options) in all.chain(schemes) {
        if let (Some(min), Some(max)) = (options.min_rounds, options.max_rounds) {
            if min > max {
                return Err(PolicyError::InvalidValue {
                    key: format!("{prefix}{scheme}.min_rounds"),
                    value: min.to_string(),
                    reason: format!("min_rounds exceeds max_rounds ({max})"),
                });
            }
        }
    }
    Ok(())
}
