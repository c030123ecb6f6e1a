use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::PolicyError;

/// Per-scheme options a policy may set
pub const OPTION_NAMES: &[&str] = &[
    "min_rounds",
    "max_rounds",
    "default_rounds",
    "vary_rounds",
    "salt_size",
    "ident",
    "relaxed",
];

/// A raw policy value, before it is interpreted for a specific key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl PolicyValue {
    /// Strings are split on commas; empty entries are dropped
    pub fn to_list(&self, key: &str) -> Result<Vec<String>, PolicyError> {
        match self {
            Self::List(items) => Ok(items.iter().map(|s| s.trim().to_string()).collect()),
            Self::Text(text) => Ok(text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
            other => Err(PolicyError::invalid_value(key, other, "expected a list of scheme names")),
        }
    }

    pub fn to_text(&self, key: &str) -> Result<String, PolicyError> {
        match self {
            Self::Text(text) => Ok(text.trim().to_string()),
            other => Err(PolicyError::invalid_value(key, other, "expected a string")),
        }
    }

    pub fn to_u32(&self, key: &str) -> Result<u32, PolicyError> {
        let parsed = match self {
            Self::Int(n) => u32::try_from(*n).ok(),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| PolicyError::invalid_value(key, self, "expected a non-negative integer"))
    }

    pub fn to_bool(&self, key: &str) -> Result<bool, PolicyError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Int(0) => Ok(false),
            Self::Int(1) => Ok(true),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(PolicyError::invalid_value(key, self, "expected a boolean")),
            },
            other => Err(PolicyError::invalid_value(key, other, "expected a boolean")),
        }
    }
}

impl fmt::Display for PolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            // Debug keeps the fractional part ("1.0"), so it reads back as a float
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for PolicyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PolicyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PolicyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for PolicyValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for PolicyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PolicyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for PolicyValue {
    fn from(value: Vec<S>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// How far generated rounds may stray from `default_rounds`
///
/// Accepts a fraction (`0.1`), a percentage (`"10%"`) or an absolute
/// number of rounds (`100`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VaryRounds {
    Fraction(f64),
    Absolute(u32),
}

impl VaryRounds {
    pub fn fraction(value: f64) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("fraction must be between 0 and 1, got {value}"));
        }
        Ok(Self::Fraction(value))
    }

    fn to_policy_value(self) -> PolicyValue {
        match self {
            Self::Fraction(x) => PolicyValue::Float(x),
            Self::Absolute(n) => PolicyValue::from(n),
        }
    }

    fn from_policy_value(key: &str, value: &PolicyValue) -> Result<Self, PolicyError> {
        let parsed = match value {
            PolicyValue::Float(x) => Self::fraction(*x),
            PolicyValue::Int(n) => u32::try_from(*n)
                .map(Self::Absolute)
                .map_err(|_| format!("{n} is not a valid number of rounds")),
            PolicyValue::Text(text) => text.parse(),
            _ => Err("expected a fraction, percentage or integer".to_string()),
        };
        parsed.map_err(|reason| PolicyError::invalid_value(key, value, &reason))
    }
}

impl fmt::Display for VaryRounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_policy_value().fmt(f)
    }
}

impl FromStr for VaryRounds {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(percent) = s.strip_suffix('%') {
            let value: f64 = percent
                .trim()
                .parse()
                .map_err(|_| format!("invalid percentage: {s}"))?;
            return Self::fraction(value / 100.0);
        }
        if let Ok(rounds) = s.parse::<u32>() {
            return Ok(Self::Absolute(rounds));
        }
        let value: f64 = s.parse().map_err(|_| format!("invalid vary_rounds: {s}"))?;
        Self::fraction(value)
    }
}

impl<'de> Deserialize<'de> for VaryRounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct VaryRoundsVisitor;

        impl serde::de::Visitor<'_> for VaryRoundsVisitor {
            type Value = VaryRounds;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a fraction (0.1), a percentage (\"10%\") or a number of rounds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(v)
                    .map(VaryRounds::Absolute)
                    .map_err(serde::de::Error::custom)
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u32::try_from(v)
                    .map(VaryRounds::Absolute)
                    .map_err(serde::de::Error::custom)
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                VaryRounds::fraction(v).map_err(serde::de::Error::custom)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(VaryRoundsVisitor)
    }
}

/// Options for one scheme (or for `all` schemes) within one scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rounds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rounds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vary_rounds: Option<VaryRounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxed: Option<bool>,
}

impl SchemeOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite every option `other` sets
    pub fn merge(&mut self, other: &SchemeOptions) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        take!(min_rounds, max_rounds, default_rounds, vary_rounds, salt_size, ident, relaxed);
    }

    /// Set one option from a raw value; `key` is only used in errors
    pub fn set(&mut self, option: &str, key: &str, value: &PolicyValue) -> Result<(), PolicyError> {
        match option {
            "min_rounds" => self.min_rounds = Some(value.to_u32(key)?),
            "max_rounds" => self.max_rounds = Some(value.to_u32(key)?),
            "default_rounds" => self.default_rounds = Some(value.to_u32(key)?),
            "vary_rounds" => self.vary_rounds = Some(VaryRounds::from_policy_value(key, value)?),
            "salt_size" => self.salt_size = Some(value.to_u32(key)? as usize),
            "ident" => self.ident = Some(value.to_text(key)?),
            "relaxed" => self.relaxed = Some(value.to_bool(key)?),
            _ => return Err(PolicyError::UnknownOption(key.to_string())),
        }
        Ok(())
    }

    /// Options that are set, in [`OPTION_NAMES`] order
    pub fn entries(&self) -> Vec<(&'static str, PolicyValue)> {
        let mut entries = Vec::new();
        if let Some(n) = self.min_rounds {
            entries.push(("min_rounds", PolicyValue::from(n)));
        }
        if let Some(n) = self.max_rounds {
            entries.push(("max_rounds", PolicyValue::from(n)));
        }
        if let Some(n) = self.default_rounds {
            entries.push(("default_rounds", PolicyValue::from(n)));
        }
        if let Some(vary) = self.vary_rounds {
            entries.push(("vary_rounds", vary.to_policy_value()));
        }
        if let Some(n) = self.salt_size {
            entries.push(("salt_size", PolicyValue::Int(n as i64)));
        }
        if let Some(ident) = &self.ident {
            entries.push(("ident", PolicyValue::from(ident.as_str())));
        }
        if let Some(relaxed) = self.relaxed {
            entries.push(("relaxed", PolicyValue::Bool(relaxed)));
        }
        entries
    }
}

/// Settings of the global scope or of one category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Replaces (not extends) the enclosing scope's list when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "SchemeOptions::is_empty")]
    pub all: SchemeOptions,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemes: BTreeMap<String, SchemeOptions>,
}

impl ScopeConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Options for `scheme`, where `"all"` addresses the shared options
    pub fn options_mut(&mut self, scheme: &str) -> &mut SchemeOptions {
        if scheme == "all" {
            &mut self.all
        } else {
            self.schemes.entry(scheme.to_string()).or_default()
        }
    }

    /// Layer `other` over this scope
    pub fn merge(&mut self, other: &ScopeConfig) {
        if other.default.is_some() {
            self.default = other.default.clone();
        }
        if other.deprecated.is_some() {
            self.deprecated = other.deprecated.clone();
        }
        self.all.merge(&other.all);
        for (scheme, options) in &other.schemes {
            self.options_mut(scheme).merge(options);
        }
    }
}
