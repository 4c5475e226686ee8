//! Application configuration.
//!
//! Values come from built-in defaults, then `config.toml` in the user's
//! config directory, then `ACHSYNC_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    auth::parse_expiry,
    engine::{CooldownPolicy, SecondInterrupt},
};

/// Directory name under the platform config dir.
pub const APP_DIR: &str = "achsync";

const DEFAULT_CONFIG: &str = r#"# achsync configuration
#
# Every key can also be set through an ACHSYNC_<KEY> environment variable,
# e.g. ACHSYNC_COOLDOWN_SECS=900.

# Seconds to pause after an interrupt or a rate-limit response.
cooldown_secs = 600

# How often a cooldown checks for a second interrupt, in milliseconds.
poll_interval_ms = 250

request_timeout_secs = 30
accept_language = "en-GB"

# Optional token to use instead of prompting, as "<userHash>;<token>".
# token = ""
# token_expiration = "2030-01-01T00:00:00Z"
"#;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Durable `{token, expiration}` record.
    pub token_path: PathBuf,
    /// Optional list of extra titles to merge into the catalogue.
    pub games_path: PathBuf,
    /// Token supplied up front instead of prompting.
    pub token: Option<String>,
    /// ISO-8601 expiry of [`AppConfig::token`].
    pub token_expiration: Option<String>,
    /// Length of a cooldown.
    pub cooldown_secs: u64,
    /// Interval at which a cooldown polls for interrupts.
    pub poll_interval_ms: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Value of the `accept-language` header.
    pub accept_language: String,
    /// Profile settings endpoint.
    pub profile_url: String,
    /// Title hub base URL.
    pub titlehub_url: String,
    /// Achievements service base URL.
    pub achievements_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let dir = app_dir();
        Self {
            token_path: dir.join("token.json"),
            games_path: dir.join("games.json"),
            token: None,
            token_expiration: None,
            cooldown_secs: 600,
            poll_interval_ms: 250,
            request_timeout_secs: 30,
            accept_language: "en-GB".to_string(),
            profile_url:
                "https://profile.xboxlive.com/users/me/profile/settings?settings=Gamertag"
                    .to_string(),
            titlehub_url: "https://titlehub.xboxlive.com".to_string(),
            achievements_url: "https://achievements.xboxlive.com".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) layered over defaults, then the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("failed to build default configuration")?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("ACHSYNC").try_parsing(true))
            .build()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        settings
            .try_deserialize()
            .context("failed to parse configuration")
    }

    /// Cooldown length.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Parsed [`AppConfig::token_expiration`]; unparsable values are ignored.
    pub fn token_expiry(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.token_expiration.as_deref().and_then(parse_expiry)
    }

    /// Pause policy for achievement discovery: a second interrupt resumes early.
    pub fn discovery_policy(&self) -> CooldownPolicy {
        self.policy(SecondInterrupt::ResumeEarly)
    }

    /// Pause policy for unlocking: a second interrupt aborts the batch.
    pub fn unlock_policy(&self) -> CooldownPolicy {
        self.policy(SecondInterrupt::Abort)
    }

    fn policy(&self, second_interrupt: SecondInterrupt) -> CooldownPolicy {
        CooldownPolicy {
            duration: self.cooldown(),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            second_interrupt,
        }
    }
}

/// `<config dir>/achsync`.
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default config file path.
pub fn config_path() -> PathBuf {
    app_dir().join("config.toml")
}

/// Write a commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    let path = config_path();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))
}
