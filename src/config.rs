//! Configuration file
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::{
    animation::StartAnimationError,
    animations::AnimationConfig,
    device::{ConnectOptions, Discovery},
    protocol::DEFAULT_PORT,
    retry::RetrySettings,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error parsing TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("invalid animation `{name}`: {source}")]
    Animation {
        name: String,
        source: StartAnimationError,
    },
    #[error("no configuration directory for the current user")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address sockets are bound to
    pub bind: SocketAddr,
    /// Destination of discovery requests
    pub broadcast: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            broadcast: SocketAddr::from(([255, 255, 255, 255], DEFAULT_PORT)),
        }
    }
}

/// Retries of requests sent to a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetryConfig {
    #[validate(range(min = 1, max = 100))]
    pub attempts: u32,
    #[validate(range(min = 1, max = 60000))]
    pub timeout_ms: u64,
    /// Added to the timeout after every attempt
    #[validate(range(max = 60000))]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = RetrySettings::default();

        Self {
            attempts: defaults.attempts,
            timeout_ms: defaults.timeout.as_millis() as u64,
            backoff_ms: defaults.backoff.as_millis() as u64,
        }
    }
}

impl From<&RetryConfig> for RetrySettings {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts,
            timeout: Duration::from_millis(config.timeout_ms),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DiscoveryConfig {
    #[validate(range(min = 1, max = 100))]
    pub attempts: u32,
    /// How long to listen for replies after each broadcast
    #[validate(range(min = 1, max = 60000))]
    pub timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let defaults = Discovery::default();

        Self {
            attempts: defaults.attempts,
            timeout_ms: defaults.timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub network: NetworkConfig,
    #[validate(nested)]
    pub retry: RetryConfig,
    #[validate(nested)]
    pub discovery: DiscoveryConfig,
    /// Named animations
    pub animations: BTreeMap<String, AnimationConfig>,
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("lanlights").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let full = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&full)?;

        debug!(path = %path.display(), animations = config.animations.len(), "loaded configuration");
        Ok(config)
    }

    /// Load the file at the default location, or the defaults if there is no such file
    pub async fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;

        match Self::load_file(&path).await {
            Err(ConfigError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate a configuration
    pub fn parse(full: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(full)?;
        config.validate()?;

        for (name, animation) in &config.animations {
            animation
                .animation
                .build()
                .map_err(|source| ConfigError::Animation {
                    name: name.clone(),
                    source,
                })?;
        }

        Ok(config)
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            bind: self.network.bind,
            retry: RetrySettings::from(&self.retry),
        }
    }

    pub fn discovery(&self) -> Discovery {
        Discovery {
            broadcast: self.network.broadcast,
            attempts: self.discovery.attempts,
            timeout: Duration::from_millis(self.discovery.timeout_ms),
            connect: self.connect_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animations::AnimationSpec;

    #[test]
    fn empty_file_is_valid() {
        let config = Config::parse("").expect("failed to parse");

        assert_eq!(config, Config::default());
        assert_eq!(config.connect_options(), ConnectOptions::default());

        let discovery = config.discovery();
        assert_eq!(discovery.attempts, 2);
        assert_eq!(discovery.timeout, Duration::from_millis(2500));
        assert_eq!(discovery.broadcast.port(), DEFAULT_PORT);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [network]
            broadcast = "192.168.1.255:56700"

            [retry]
            attempts = 5

            [animations.candle]
            type = "flame"
            brightness_min = 0.1

            [animations.scroll]
            type = "move"
            direction = "outward"
            colors = { type = "interpolated", cyclic = true, colors = [
                { hue = 0, saturation = 65535, brightness = 65535, kelvin = 3500 },
                { hue = 43691, saturation = 65535, brightness = 65535, kelvin = 3500 },
            ] }
            "#,
        )
        .expect("failed to parse");

        assert_eq!(config.network.broadcast.to_string(), "192.168.1.255:56700");
        assert_eq!(config.connect_options().retry.attempts, 5);
        assert_eq!(config.retry.timeout_ms, 500);
        assert_eq!(
            config.animations.keys().collect::<Vec<_>>(),
            vec!["candle", "scroll"]
        );
        assert!(matches!(
            config.animations["candle"].animation,
            AnimationSpec::Flame(ref settings) if settings.brightness_min == 0.1
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            Config::parse("[retry]\nattempts = 0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("[discovery]\ntimeout_ms = 0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn invalid_animations_are_rejected() {
        let result = Config::parse(
            "[animations.broken]\ntype = \"flame\"\nbrightness_min = 0.9\nbrightness_max = 0.1\n",
        );

        assert!(matches!(
            result,
            Err(ConfigError::Animation { ref name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn dumped_config_parses_back() {
        let mut config = Config::default();
        config.retry.attempts = 7;
        config.animations.insert(
            "candle".to_owned(),
            toml::from_str("type = \"flame\"").expect("failed to parse animation"),
        );

        let dumped = config.to_string().expect("failed to serialize");
        assert_eq!(Config::parse(&dumped).expect("failed to parse"), config);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let result = Config::load_file(Path::new("/nonexistent/lanlights.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
