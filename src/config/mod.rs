//! Configuration module for the capture service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MAX_ENTRIES: usize = 10;
pub const DEFAULT_EXPIRY_MINUTES: u64 = 60;
pub const DEFAULT_OUTPUT_FILE: &str = ".see-my-clicks/clicked.json";
pub const DEFAULT_MOUNT_PATH: &str = "/__see-my-clicks";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7777";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum captures kept per session
    pub max_entries: usize,
    /// Captures older than this are swept on the next access
    pub expiry_minutes: u64,
    /// JSON document holding all sessions
    pub output_file: PathBuf,
    /// Path prefix the endpoint is mounted under
    pub mount_path: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            expiry_minutes: DEFAULT_EXPIRY_MINUTES,
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let max_entries = parse_var("SMC_MAX_ENTRIES", defaults.max_entries).max(1);
        let expiry_minutes = parse_var("SMC_EXPIRY_MINUTES", defaults.expiry_minutes);

        let output_file = env::var("SMC_OUTPUT_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_file);

        let mount_path = env::var("SMC_MOUNT_PATH")
            .map(|p| normalize_mount_path(&p))
            .unwrap_or(defaults.mount_path);

        let bind_addr = parse_var("SMC_BIND_ADDR", defaults.bind_addr);

        let log_level = env::var("SMC_LOG_LEVEL").unwrap_or(defaults.log_level);

        Self {
            max_entries,
            expiry_minutes,
            output_file,
            mount_path,
            bind_addr,
            log_level,
        }
    }

    /// Expiry window as a duration.
    pub fn expiry(&self) -> chrono::Duration {
        i64::try_from(self.expiry_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Read and parse a variable, falling back to `default` when unset or malformed.
fn parse_var<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Leading slash, no trailing slash. An empty path falls back to the default mount.
pub fn normalize_mount_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_MOUNT_PATH.to_string();
    }
    format!("/{}", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 6] = [
        "SMC_MAX_ENTRIES",
        "SMC_EXPIRY_MINUTES",
        "SMC_OUTPUT_FILE",
        "SMC_MOUNT_PATH",
        "SMC_BIND_ADDR",
        "SMC_LOG_LEVEL",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = Config::from_env();

        assert_eq!(config.max_entries, 10);
        assert_eq!(config.expiry_minutes, 60);
        assert_eq!(config.output_file, PathBuf::from(".see-my-clicks/clicked.json"));
        assert_eq!(config.mount_path, "/__see-my-clicks");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("SMC_MAX_ENTRIES", "0");
        env::set_var("SMC_EXPIRY_MINUTES", "soon");
        env::set_var("SMC_MOUNT_PATH", "captures/");
        env::set_var("SMC_BIND_ADDR", "not an address");

        let config = Config::from_env();
        clear_env();

        assert_eq!(config.max_entries, 1);
        assert_eq!(config.expiry_minutes, 60);
        assert_eq!(config.mount_path, "/captures");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path("/__see-my-clicks/"), "/__see-my-clicks");
        assert_eq!(normalize_mount_path("  "), DEFAULT_MOUNT_PATH);
        assert_eq!(normalize_mount_path("a/b"), "/a/b");
    }
}
