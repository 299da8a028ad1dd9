use std::env;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),
}

/// Settings for the node binary, read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Interface the HTTP server binds to
    pub host: String,

    /// Port the HTTP server listens on
    pub port: u16,

    /// Hex secret key of the node wallet; a fresh key is generated when unset
    pub wallet_secret_key: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            wallet_secret_key: None,
        }
    }
}

impl NodeConfig {
    /// Reads the node settings from the environment
    ///
    /// `HOST` and `PORT` fall back to the defaults when unset;
    /// `WALLET_SECRET_KEY` is optional.
    ///
    /// # Returns
    ///
    /// The configuration, or `InvalidPort` when `PORT` does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            env::var("HOST").ok(),
            env::var("PORT").ok(),
            env::var("WALLET_SECRET_KEY").ok(),
        )
    }

    fn from_vars(
        host: Option<String>,
        port: Option<String>,
        wallet_secret_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match port {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(value))?,
            None => defaults.port,
        };

        Ok(NodeConfig {
            host: host.unwrap_or(defaults.host),
            port,
            wallet_secret_key: wallet_secret_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::from_vars(None, None, None).unwrap();

        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_overrides() {
        let config = NodeConfig::from_vars(
            Some("0.0.0.0".to_string()),
            Some("3001".to_string()),
            Some("ab".repeat(32)),
        )
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.wallet_secret_key, Some("ab".repeat(32)));
    }

    #[test]
    fn test_blank_secret_key_is_unset() {
        let config = NodeConfig::from_vars(None, None, Some("  ".to_string())).unwrap();

        assert!(config.wallet_secret_key.is_none());
    }

    #[test]
    fn test_invalid_port() {
        let result = NodeConfig::from_vars(None, Some("not-a-port".to_string()), None);

        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));
    }
}
