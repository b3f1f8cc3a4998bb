//! Authority server endpoint configuration

use url::Url;

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Default websocket endpoint of the show authority during development.
///
/// The authority serves both the websocket session and the song files on
/// port 5000, so this only needs overriding for remote deployments.
const DEFAULT_ENDPOINT: &str = "ws://localhost:5000/ws";

/// Connection settings for the show authority
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Websocket endpoint of the authority
    pub endpoint: Url,

    /// Handshake timeout in seconds
    pub handshake_timeout_secs: u64,
}

impl ServerConfig {
    /// Load server configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let raw = get_env_or_default("SHOWLINK_SERVER_URL", DEFAULT_ENDPOINT);
        let endpoint = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl("SHOWLINK_SERVER_URL".into(), e.to_string()))?;

        match endpoint.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ConfigError::InvalidUrl(
                    "SHOWLINK_SERVER_URL".into(),
                    format!("expected ws:// or wss:// scheme, got {}://", other),
                ));
            }
        }

        Ok(Self {
            endpoint,
            handshake_timeout_secs: parse_env("SHOWLINK_HANDSHAKE_TIMEOUT_SECS", 10)?,
        })
    }

    /// Create a configuration with a custom endpoint (useful for testing)
    pub fn with_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint,
            handshake_timeout_secs: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is valid"),
            handshake_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.endpoint.as_str(), "ws://localhost:5000/ws");
        assert_eq!(config.handshake_timeout_secs, 10);
    }

    #[test]
    fn test_from_env_custom_endpoint() {
        temp_env::with_vars(
            [("SHOWLINK_SERVER_URL", Some("wss://show.example.com/session"))],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.endpoint.scheme(), "wss");
                assert_eq!(config.endpoint.host_str(), Some("show.example.com"));
            },
        );
    }

    #[test]
    fn test_from_env_rejects_http_scheme() {
        temp_env::with_vars(
            [("SHOWLINK_SERVER_URL", Some("http://localhost:5000"))],
            || {
                let err = ServerConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("SHOWLINK_SERVER_URL"));
            },
        );
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        temp_env::with_vars([("SHOWLINK_SERVER_URL", Some("not a url"))], || {
            assert!(ServerConfig::from_env().is_err());
        });
    }
}
