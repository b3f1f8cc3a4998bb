//! Session synchronization tunables

use std::time::Duration;

use crate::{parse_env, ConfigError, ConfigResult};

/// Tunables for connection recovery and playback reconciliation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often displayed connectivity is refreshed, in milliseconds.
    ///
    /// Connectivity is polled rather than pushed, so what consumers see may
    /// lag reality by up to one interval.
    pub poll_interval_ms: u64,

    /// How often the local playback position is compared against the
    /// remote one, in milliseconds
    pub observe_interval_ms: u64,

    /// Minimum local/remote position difference, in seconds, that triggers
    /// a corrective seek
    pub seek_tolerance_secs: f64,

    /// Consecutive failed connection attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Delay between connection attempts, in milliseconds
    pub reconnect_delay_ms: u64,
}

impl SyncConfig {
    /// Load sync configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            poll_interval_ms: parse_env("SHOWLINK_POLL_INTERVAL_MS", 1000)?,
            observe_interval_ms: parse_env("SHOWLINK_OBSERVE_INTERVAL_MS", 250)?,
            seek_tolerance_secs: parse_env("SHOWLINK_SEEK_TOLERANCE_SECS", 0.5)?,
            max_reconnect_attempts: parse_env("SHOWLINK_MAX_RECONNECT_ATTEMPTS", 5)?,
            reconnect_delay_ms: parse_env("SHOWLINK_RECONNECT_DELAY_MS", 1000)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.seek_tolerance_secs < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "SHOWLINK_SEEK_TOLERANCE_SECS must be non-negative, got {}",
                self.seek_tolerance_secs
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "SHOWLINK_POLL_INTERVAL_MS must be greater than zero".into(),
            ));
        }
        if self.observe_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "SHOWLINK_OBSERVE_INTERVAL_MS must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Connectivity poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Position observation interval as a [`Duration`]
    pub fn observe_interval(&self) -> Duration {
        Duration::from_millis(self.observe_interval_ms)
    }

    /// Delay between connection attempts as a [`Duration`]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            observe_interval_ms: 250,
            seek_tolerance_secs: 0.5,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.seek_tolerance_secs, 0.5);
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("SHOWLINK_POLL_INTERVAL_MS", Some("500")),
                ("SHOWLINK_SEEK_TOLERANCE_SECS", Some("1.5")),
                ("SHOWLINK_MAX_RECONNECT_ATTEMPTS", Some("3")),
            ],
            || {
                let config = SyncConfig::from_env().unwrap();
                assert_eq!(config.poll_interval_ms, 500);
                assert_eq!(config.seek_tolerance_secs, 1.5);
                assert_eq!(config.max_reconnect_attempts, 3);
            },
        );
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        temp_env::with_vars([("SHOWLINK_SEEK_TOLERANCE_SECS", Some("-0.5"))], || {
            assert!(SyncConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        temp_env::with_vars([("SHOWLINK_POLL_INTERVAL_MS", Some("0"))], || {
            assert!(SyncConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_unparseable_value_rejected() {
        temp_env::with_vars([("SHOWLINK_MAX_RECONNECT_ATTEMPTS", Some("many"))], || {
            let err = SyncConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("SHOWLINK_MAX_RECONNECT_ATTEMPTS"));
        });
    }
}
