use crate::address;
use anyhow::{bail, Context};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Verbosity of the service log, ordered from least to most chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    #[default]
    Error,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

// Unknown levels quietly fall back to "error".
impl From<String> for LogLevel {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            _ => LogLevel::Error,
        }
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub log_file: String,
    pub log_level: LogLevel,
    pub fallback_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub max_line_length: usize,
    pub read_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: "127.0.0.1:10022".to_string(),
            log_file: String::new(),
            log_level: LogLevel::Error,
            fallback_address: String::new(),
            user: None,
            group: None,
            max_line_length: 1024,
            read_timeout_seconds: 30,
        }
    }
}

impl Config {
    pub fn default_path() -> &'static str {
        "/etc/srs-resolver/srs-resolver.conf"
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The configured fallback address, or `None` when it is left empty.
    pub fn fallback(&self) -> Option<&str> {
        non_empty(&self.fallback_address)
    }

    pub fn drop_user(&self) -> Option<&str> {
        self.user.as_deref().and_then(non_empty)
    }

    pub fn drop_group(&self) -> Option<&str> {
        self.group.as_deref().and_then(non_empty)
    }

    /// True when a fallback is set but would not pass as a clean email, e.g.
    /// a bare local mailbox such as `postmaster`. Such a fallback is still used.
    pub fn fallback_is_local(&self) -> bool {
        self.fallback()
            .is_some_and(|fallback| !address::is_clean_email(fallback))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen.trim().is_empty() {
            bail!("listen address must not be empty");
        }
        if self.max_line_length < 16 {
            bail!(
                "max_line_length must be at least 16 bytes (got {})",
                self.max_line_length
            );
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
