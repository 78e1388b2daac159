//! Harness output settings.

use std::env;

/// Suppresses per-case start lines when set.
pub const QUIET_ENV: &str = "PMU_QUIET";

/// What the harness writes to its diagnostic channel.
///
/// Failures, case results, placeholder markers and function summaries
/// are always written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Skip the `case <name> ...` line written when a case opens.
    pub quiet: bool,
}

impl HarnessConfig {
    /// Defaults overridden by `PMU_QUIET`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let quiet = flag(&lookup, QUIET_ENV).unwrap_or(defaults.quiet);
        Self { quiet }
    }
}

fn flag<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        other => {
            tracing::warn!(variable = key, value = other, "unrecognized flag value, using default");
            None
        }
    }
}
