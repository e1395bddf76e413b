use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Where and how the service writes its logs
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub dir: PathBuf,
    /// JSON lines instead of the human-readable format
    pub json: bool,
}

impl LogConfig {
    /// `LOG_LEVEL` and `LOG_DIR`; production defaults to info and JSON.
    pub fn from_env(is_production: bool) -> Self {
        let default_level = if is_production {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };

        Self {
            level: std::env::var("LOG_LEVEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default_level),
            dir: std::env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs")),
            json: is_production,
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!(
            "promo_admin_backend={},tower_http=debug,axum=debug",
            self.level
        )
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Debug,
            dir: PathBuf::from("logs"),
            json: false,
        }
    }
}
