//! Bootstrap configuration loading
//!
//! The TOML file only carries what the service needs before it can open the
//! database: listen address, database path, outbound email settings and
//! logging. Resolution priority for the config file location:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file, then system-wide config file
//! 4. Compiled defaults (no file at all)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "OUTREACH_CONFIG";

/// Environment variable holding the outbound email API key
pub const EMAIL_API_KEY_ENV: &str = "OUTREACH_EMAIL_API_KEY";

/// Environment variable overriding the public site URL
pub const SITE_URL_ENV: &str = "OUTREACH_SITE_URL";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public site used to build listing and unsubscribe links
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Minimum spacing between two outbound sends, in milliseconds
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,

    /// Mailbox prospects are invited to reply to
    #[serde(default = "default_reply_to")]
    pub reply_to: String,

    /// Phone number advertised in demo invitations
    #[serde(default)]
    pub demo_phone_number: Option<String>,

    /// Outbound email provider settings
    #[serde(default)]
    pub email: EmailConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Outbound email provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Provider endpoint accepting a SendGrid v3 style JSON payload
    #[serde(default = "default_email_api_url")]
    pub api_url: String,

    /// Bearer token; sends fail with "not configured" when absent
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_reply_to")]
    pub from_email: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Per-request timeout
    #[serde(default = "default_email_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bind_address: default_bind_address(),
            port: default_port(),
            site_url: default_site_url(),
            send_delay_ms: default_send_delay_ms(),
            reply_to: default_reply_to(),
            demo_phone_number: None,
            email: EmailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: default_email_api_url(),
            api_key: None,
            from_email: default_reply_to(),
            from_name: default_from_name(),
            timeout_secs: default_email_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_database_path() -> PathBuf {
    default_data_folder().join("outreach.db")
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_site_url() -> String {
    "https://greenline365.com".to_string()
}

fn default_send_delay_ms() -> u64 {
    200
}

fn default_reply_to() -> String {
    "greenline365help@gmail.com".to_string()
}

fn default_from_name() -> String {
    "GreenLine365".to_string()
}

fn default_email_api_url() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

fn default_email_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("outreach"))
        .unwrap_or_else(|| PathBuf::from("./outreach_data"))
}

/// Locate the config file following the priority order above
///
/// Returns `None` when no candidate exists; callers fall back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("outreach").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/outreach/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load configuration, degrading to defaults when the file is missing
///
/// A file that exists but fails to parse is still an error: silently
/// ignoring a typo would send mail with the wrong settings.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)?
        }
        Some(path) => {
            warn!("Config file {} not found, using defaults", path.display());
            TomlConfig::default()
        }
        None => {
            warn!("No config file found, using defaults");
            TomlConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Environment variables win over values read from the file
pub fn apply_env_overrides(config: &mut TomlConfig) {
    if let Ok(key) = std::env::var(EMAIL_API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.email.api_key = Some(key);
        }
    }

    if let Ok(url) = std::env::var(SITE_URL_ENV) {
        if !url.trim().is_empty() {
            config.site_url = url.trim_end_matches('/').to_string();
        }
    }
}
