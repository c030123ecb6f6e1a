use rand::Rng;

use super::models::{SchemeOptions, VaryRounds};
use crate::handlers::{HashHandler, RoundsCost, RoundsSpec, Settings};

/// Rounds a context generates and accepts for one scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundsWindow {
    /// Policy bounds; hashes outside them need an update
    pub min: u32,
    pub max: u32,
    pub default: u32,
    /// Range new hashes draw their rounds from
    pub lower: u32,
    pub upper: u32,
}

impl RoundsWindow {
    /// Combine policy options with the handler's own bounds
    ///
    /// Policy values outside the handler bounds are clamped with a warning.
    pub fn resolve(scheme: &str, options: &SchemeOptions, spec: &RoundsSpec) -> Self {
        let clamp = |name: &str, value: u32| {
            let clamped = value.clamp(spec.min(), spec.max());
            if clamped != value {
                tracing::warn!(
                    scheme,
                    "{name} {value} outside supported range {}..={}, using {clamped}",
                    spec.min(),
                    spec.max()
                );
            }
            clamped
        };

        let min = options.min_rounds.map_or(spec.min(), |v| clamp("min_rounds", v));
        let mut max = options.max_rounds.map_or(spec.max(), |v| clamp("max_rounds", v));
        if min > max {
            tracing::warn!(scheme, "min_rounds {min} exceeds max_rounds {max}, raising max_rounds");
            max = min;
        }

        let default = options
            .default_rounds
            .map_or(spec.default_rounds(), |v| clamp("default_rounds", v))
            .clamp(min, max);

        let (lower, upper) = match options.vary_rounds {
            Some(vary) => vary_bounds(default, vary, spec.cost()),
            None => (default, default),
        };

        Self {
            min,
            max,
            default,
            lower: lower.clamp(min, max),
            upper: upper.clamp(min, max),
        }
    }

    pub fn accepts(&self, rounds: u32) -> bool {
        (self.min..=self.max).contains(&rounds)
    }

    /// Rounds for a new hash
    pub fn pick(&self) -> u32 {
        if self.lower >= self.upper {
            return self.lower;
        }
        rand::thread_rng().gen_range(self.lower..=self.upper)
    }
}

fn vary_bounds(default: u32, vary: VaryRounds, cost: RoundsCost) -> (u32, u32) {
    match cost {
        RoundsCost::Linear => {
            let delta = match vary {
                VaryRounds::Fraction(fraction) => (f64::from(default) * fraction) as u32,
                VaryRounds::Absolute(rounds) => rounds,
            };
            (default.saturating_sub(delta), default.saturating_add(delta))
        }
        // vary the work (2^rounds) linearly, then map back to log2 rounds
        RoundsCost::Log2 => {
            let work = 2f64.powi(default.min(1023) as i32);
            let delta = match vary {
                VaryRounds::Fraction(fraction) => work * fraction,
                VaryRounds::Absolute(rounds) => f64::from(rounds),
            };
            let lower = if work - delta < 1.0 {
                0
            } else {
                (work - delta).log2().ceil() as u32
            };
            let upper = (work + delta).log2().floor() as u32;
            (lower, upper)
        }
    }
}

/// Settings and rounds window a context applies to one scheme
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveOptions {
    /// Template passed to `HashHandler::hash` (rounds filled per call)
    pub settings: Settings,
    pub window: Option<RoundsWindow>,
}

impl EffectiveOptions {
    /// Drop options the handler cannot use, with a warning
    pub fn resolve(handler: &dyn HashHandler, options: &SchemeOptions) -> Self {
        let scheme = handler.name();
        let mut settings = Settings::default().with_defaults();
        settings.relaxed = options.relaxed.unwrap_or(false);

        if let Some(ident) = &options.ident {
            if handler.ident_spec().is_some() {
                settings.ident = Some(ident.clone());
            } else {
                tracing::warn!(scheme, "ident option ignored: scheme has a single ident");
            }
        }
        if let Some(size) = options.salt_size {
            if handler.salt_spec().is_some() {
                settings.salt_size = Some(size);
            } else {
                tracing::warn!(scheme, "salt_size option ignored: scheme is unsalted");
            }
        }

        let window = handler
            .rounds_spec()
            .map(|spec| RoundsWindow::resolve(scheme, options, spec));
        if window.is_none() && has_rounds_options(options) {
            tracing::warn!(scheme, "rounds options ignored: scheme has fixed cost");
        }

        Self { settings, window }
    }

    /// Settings for one `hash` call
    pub fn settings(&self) -> Settings {
        let mut settings = self.settings.clone();
        if let Some(window) = &self.window {
            settings.rounds = Some(window.pick());
        }
        settings
    }

    /// Settings for a config string; rounds stay at the default
    pub fn config_settings(&self) -> Settings {
        let mut settings = self.settings.clone();
        settings.rounds = self.window.map(|window| window.default);
        settings
    }
}

fn has_rounds_options(options: &SchemeOptions) -> bool {
    options.min_rounds.is_some()
        || options.max_rounds.is_some()
        || options.default_rounds.is_some()
        || options.vary_rounds.is_some()
}
