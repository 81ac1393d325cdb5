use std::env;

use chrono::Duration;
use log::*;

use crate::escrow::DEFAULT_ESCROW_RELEASE_WINDOW;

const DEFAULT_POLICY_TTL: Duration = Duration::seconds(300);
const DEFAULT_MAX_NAME_LEN: usize = 200;
const DEFAULT_MAX_NOTES_LEN: usize = 1000;

/// Tunables for the order flow engine. Everything has a sensible default; deployments can override the time-based
/// knobs through the environment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// How long after delivery the platform holds escrow before auto-releasing to the seller.
    pub escrow_release_window: Duration,
    /// How long a fetched status policy config is served before it is re-fetched from the gateway.
    pub policy_ttl: Duration,
    pub max_name_len: usize,
    pub max_notes_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escrow_release_window: DEFAULT_ESCROW_RELEASE_WINDOW,
            policy_ttl: DEFAULT_POLICY_TTL,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_notes_len: DEFAULT_MAX_NOTES_LEN,
        }
    }
}

impl EngineConfig {
    /// Build a config from `OFE_ESCROW_RELEASE_HOURS` and `OFE_POLICY_TTL_SECS`, falling back to the defaults for
    /// anything unset or unparseable. Bad values are logged, never fatal.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Ok(s) = env::var("OFE_ESCROW_RELEASE_HOURS") {
            match s.parse::<i64>() {
                Ok(hours) if hours > 0 => config.escrow_release_window = Duration::hours(hours),
                _ => error!(
                    "🪛️ {s} is not a valid value for OFE_ESCROW_RELEASE_HOURS. Using the default, \
                     {DEFAULT_ESCROW_RELEASE_WINDOW}, instead."
                ),
            }
        }
        if let Ok(s) = env::var("OFE_POLICY_TTL_SECS") {
            match s.parse::<i64>() {
                Ok(secs) if secs >= 0 => config.policy_ttl = Duration::seconds(secs),
                _ => error!(
                    "🪛️ {s} is not a valid value for OFE_POLICY_TTL_SECS. Using the default, {DEFAULT_POLICY_TTL}, \
                     instead."
                ),
            }
        }
        config
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.escrow_release_window, Duration::hours(48));
        assert_eq!(config.policy_ttl, Duration::seconds(300));
        assert_eq!(config.max_notes_len, 1000);
    }
}
