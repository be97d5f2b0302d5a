//! Configuration for the watcher subsystem.
//!
//! Provides layered configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional config file
//! 3. Environment variables (highest priority)

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct WatchSettings {
    /// Store manager scheduling parameters
    #[serde(default)]
    pub manager: ManagerConfig,
    /// Raw change feed channel parameters
    #[serde(default)]
    pub feed: FeedConfig,
}

impl WatchSettings {
    /// Load configuration from defaults, an optional file, and
    /// `TOPOWATCH`-prefixed environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = path {
            config = config.add_source(File::with_name(path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("TOPOWATCH")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: WatchSettings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.manager.validate()?;
        self.feed.validate()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManagerConfig {
    /// Capacity of the watcher request channel. Watcher `next` calls
    /// block on a full channel rather than being dropped.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            request_capacity: default_request_capacity(),
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "manager.request_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeedConfig {
    /// Capacity of the raw change feed channel. The feed producer
    /// blocks on a full channel; notifications are never dropped.
    #[serde(default = "default_feed_capacity")]
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_feed_capacity(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "feed.channel_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_request_capacity() -> usize {
    64
}

fn default_feed_capacity() -> usize {
    256
}
