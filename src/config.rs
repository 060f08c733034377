//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILFWD_CONFIG` (environment variable)
//! 2. `~/.config/mailfwd/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailfwd\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! `FORWARD_TO_EMAIL`, `FROM_EMAIL` and `EMAIL_BUCKET` override the file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compose::ForwardSettings;
use crate::i18n::Lang;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Forwarding target and labelling.
    pub forward: ForwardConfig,
    /// Where raw messages are stored.
    pub storage: StorageConfig,
    /// Outbound SMTP relay.
    pub relay: RelayConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
    /// Language of the forwarded message: "en" or "de". Defaults to system locale.
    pub lang: Option<String>,
}

/// Forwarding target and labelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Mailbox receiving forwarded copies.
    pub forward_to: String,
    /// Verified sender address used by the relay.
    pub from_address: String,
    /// Subject marker override (localized "[Forwarded]" when unset).
    pub subject_marker: Option<String>,
}

/// Where raw messages are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local directory mirroring the buckets (`root/bucket/key`).
    pub root: PathBuf,
    /// Bucket used when the event carries no storage location.
    pub default_bucket: String,
    /// Key prefix prepended to the message id in that case.
    pub key_prefix: String,
}

/// How to talk to the SMTP relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelaySecurity {
    /// Implicit TLS (port 465).
    Tls,
    /// Plain connection upgraded with STARTTLS (port 587).
    Starttls,
    /// Unencrypted, for a local relay only.
    None,
}

/// Outbound SMTP relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub security: RelaySecurity,
    pub username: Option<String>,
    pub password: Option<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            lang: None,
        }
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            forward_to: "postmaster@localhost".to_string(),
            from_address: "forwarder@localhost".to_string(),
            subject_marker: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            default_bucket: "email-storage".to_string(),
            key_prefix: "emails/".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            security: RelaySecurity::Starttls,
            username: None,
            password: None,
        }
    }
}

impl Config {
    /// Apply the environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |name| var(name).filter(|v: &String| !v.trim().is_empty());
        if let Some(to) = non_empty("FORWARD_TO_EMAIL") {
            self.forward.forward_to = to;
        }
        if let Some(from) = non_empty("FROM_EMAIL") {
            self.forward.from_address = from;
        }
        if let Some(bucket) = non_empty("EMAIL_BUCKET") {
            self.storage.default_bucket = bucket;
        }
    }

    /// The configured language, if it names a supported one.
    pub fn lang(&self) -> Option<Lang> {
        self.general.lang.as_deref().and_then(Lang::from_code)
    }

    /// Composer settings for the given language.
    pub fn forward_settings(&self, lang: Lang) -> ForwardSettings {
        ForwardSettings {
            from_address: self.forward.from_address.clone(),
            forward_to: self.forward.forward_to.clone(),
            lang,
            subject_marker: self.forward.subject_marker.clone(),
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations, then apply env overrides.
///
/// Falls back to the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    let mut config = read_config_file().unwrap_or_default();
    config.apply_env();
    config
}

fn read_config_file() -> Option<Config> {
    let path = config_file_path()?;
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                None
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            None
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILFWD_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailfwd").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailfwd")
}
