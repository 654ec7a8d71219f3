//! Daemon configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardkeep_console::ProtocolTiming;
use shardkeep_room::PlatformPaths;
use shardkeep_session::SessionConfig;

use crate::ShardkeepError;

/// Remote endpoint answering with the latest game build number.
pub const DEFAULT_VERSION_URL: &str = "http://ver.tugos.cn/getLocalVersion";

/// A public-IP lookup service and the JSON field holding the address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpProvider {
    pub url: String,
    pub field: String,
}

/// Everything the daemon needs to know before it loads any room.
///
/// Every field has a default, so a config file only lists what differs.
/// `SHARDKEEP_*` environment variables override the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub paths: PlatformPaths,

    /// JSON file holding rooms, worlds and settings.
    pub state_file: PathBuf,

    /// Cluster language and message language: `en` or `zh`.
    pub lang: String,

    /// Timeout of every outbound HTTP request, in seconds.
    pub http_timeout_secs: u64,

    /// Wait between the restart warning and the restart itself, in seconds.
    pub restart_delay_secs: u64,

    pub version_url: String,

    /// Tried in order until one answers.
    pub ip_providers: Vec<IpProvider>,

    pub session: SessionConfig,

    pub console: ProtocolTiming,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            paths: PlatformPaths::default(),
            state_file: PathBuf::from("shardkeep.json"),
            lang: "zh".to_owned(),
            http_timeout_secs: 30,
            restart_delay_secs: 60,
            version_url: DEFAULT_VERSION_URL.to_owned(),
            ip_providers: vec![
                IpProvider {
                    url: "http://ip-api.com/json/?lang=zh-CN".to_owned(),
                    field: "query".to_owned(),
                },
                IpProvider {
                    url: "https://qifu-api.baidubce.com/ip/local/geo/v1/district".to_owned(),
                    field: "ip".to_owned(),
                },
            ],
            session: SessionConfig::default(),
            console: ProtocolTiming::default(),
        }
    }
}

impl ControlConfig {
    /// Reads a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ShardkeepError> {
        let text = std::fs::read_to_string(path).map_err(ShardkeepError::io(path))?;
        serde_json::from_str(&text).map_err(|e| ShardkeepError::Config(format!("{}: {e}", path.display())))
    }

    /// Loads the file if it exists, then applies the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ShardkeepError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ShardkeepError> {
        Self::load(None)
    }

    /// Applies `SHARDKEEP_*` overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ShardkeepError> {
        if let Some(root) = var("SHARDKEEP_ROOT") {
            self.paths.root = root.into();
        }
        if let Some(dir) = var("SHARDKEEP_CLUSTER_ROOT") {
            self.paths.cluster_root = dir.into();
        }
        if let Some(dir) = var("SHARDKEEP_GAME_DIR") {
            self.session.game_dir = dir.clone();
            self.paths.game_dir = dir.into();
        }
        if let Some(dir) = var("SHARDKEEP_STEAMCMD_DIR") {
            self.paths.steamcmd_dir = dir.into();
        }
        if let Some(file) = var("SHARDKEEP_STATE_FILE") {
            self.state_file = file.into();
        }
        if let Some(lang) = var("SHARDKEEP_LANG") {
            self.lang = lang;
        }
        if let Some(url) = var("SHARDKEEP_VERSION_URL") {
            self.version_url = url;
        }
        if let Some(secs) = var("SHARDKEEP_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = secs
                .parse()
                .map_err(|_| ShardkeepError::Config(format!("SHARDKEEP_HTTP_TIMEOUT_SECS={secs:?}")))?;
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    /// The state file, relative paths resolved against the platform root.
    pub fn state_path(&self) -> PathBuf {
        self.paths.root.join(&self.state_file)
    }
}
