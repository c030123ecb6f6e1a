use serde::{Deserialize, Serialize};

use super::traits::{HandlerError, Result};
use super::types::Settings;

/// How the rounds value maps to work performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundsCost {
    /// Work grows linearly with `rounds`
    Linear,
    /// Work is `2^rounds`
    Log2,
}

/// Rounds capability of a scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundsSpec {
    min: u32,
    max: u32,
    default: u32,
    cost: RoundsCost,
}

impl RoundsSpec {
    pub fn new(min: u32, max: u32, default: u32, cost: RoundsCost) -> Result<Self> {
        if min > max || default < min || default > max {
            return Err(HandlerError::InvalidDefinition(format!(
                "rounds bounds must satisfy min <= default <= max (got {min}, {default}, {max})"
            )));
        }
        Ok(Self { min, max, default, cost })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn default_rounds(&self) -> u32 {
        self.default
    }

    pub fn cost(&self) -> RoundsCost {
        self.cost
    }

    pub fn contains(&self, rounds: u32) -> bool {
        (self.min..=self.max).contains(&rounds)
    }

    /// Validate `rounds`; relaxed mode clamps with a warning
    pub fn normalize(&self, rounds: u32, relaxed: bool) -> Result<u32> {
        let clamped = rounds.clamp(self.min, self.max);
        if clamped == rounds {
            return Ok(rounds);
        }

        let reason = if rounds < self.min {
            format!("rounds {rounds} below minimum {}", self.min)
        } else {
            format!("rounds {rounds} above maximum {}", self.max)
        };
        if !relaxed {
            return Err(HandlerError::OutOfRange { setting: "rounds", reason });
        }
        tracing::warn!("{reason}, clamping to {clamped}");
        Ok(clamped)
    }

    /// Rounds for a new record: explicit, default, or an error
    pub fn resolve(&self, settings: &Settings) -> Result<u32> {
        match settings.rounds {
            Some(rounds) => self.normalize(rounds, settings.relaxed),
            None if settings.use_defaults => Ok(self.default),
            None => Err(HandlerError::MissingSetting("rounds")),
        }
    }
}
