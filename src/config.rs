use crate::errors::{MysqlTestError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TAG: &str = "mysql:latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RUNTIME: &str = "docker";

/// Longest startup timeout accepted; anything beyond a day is a typo
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Name of the optional per-project config file
pub const CONFIG_FILE_NAME: &str = ".mysqltest.yml";

/// Settings for one disposable mysqld container.
///
/// Treat as immutable once passed to [`crate::Mysqld::new`]; the instance keeps its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqldConfig {
    /// Image reference passed to `docker run`
    pub tag: String,
    /// How long to wait for the server to accept connections
    pub timeout: Duration,
    /// Container runtime program (anything docker-CLI compatible)
    pub runtime: String,
}

impl Default for MysqldConfig {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            runtime: DEFAULT_RUNTIME.to_string(),
        }
    }
}

/// On-disk layout of `.mysqltest.yml`; every key is optional
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    timeout: Option<TimeoutValue>,
    #[serde(default)]
    runtime: Option<String>,
}

/// Timeouts may be written as a bare number of seconds or as "30s" / "2m"
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimeoutValue {
    Seconds(u64),
    Text(String),
}

impl TimeoutValue {
    fn to_duration(&self) -> Result<Duration> {
        match self {
            TimeoutValue::Seconds(secs) => check_timeout(Duration::from_secs(*secs)),
            TimeoutValue::Text(text) => parse_timeout(text),
        }
    }
}

impl MysqldConfig {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Reject settings that cannot be used to start an instance
    pub fn validate(&self) -> Result<()> {
        check_timeout(self.timeout)?;
        if self.tag.trim().is_empty() {
            return Err(MysqlTestError::Config("image tag is empty".to_string()));
        }
        if self.runtime.trim().is_empty() {
            return Err(MysqlTestError::Config("runtime program is empty".to_string()));
        }
        Ok(())
    }

    /// Timeout rounded down to whole seconds, the granularity of the poll loop
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }

    /// Load config from .mysqltest.yml in `dir`, falling back to defaults
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            // No config file, return defaults
            return Ok(MysqldConfig::default());
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML document, defaulting any missing keys
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map
        let file: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yml::from_str(content).map_err(|e| {
                MysqlTestError::Config(format!("Failed to parse config: {}", e))
            })?
        };

        let mut config = MysqldConfig::default();
        if let Some(tag) = file.tag {
            config.tag = tag;
        }
        if let Some(timeout) = file.timeout {
            config.timeout = timeout.to_duration()?;
        }
        if let Some(runtime) = file.runtime {
            config.runtime = runtime;
        }

        Ok(config)
    }

    /// Override fields from MYSQLTEST_TAG, MYSQLTEST_TIMEOUT and MYSQLTEST_RUNTIME
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(tag) = non_empty_var("MYSQLTEST_TAG") {
            self.tag = tag;
        }
        if let Some(timeout) = non_empty_var("MYSQLTEST_TIMEOUT") {
            self.timeout = parse_timeout(&timeout)?;
        }
        if let Some(runtime) = non_empty_var("MYSQLTEST_RUNTIME") {
            self.runtime = runtime;
        }
        Ok(self)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse timeout string (e.g., "30s", "1m") into a duration
pub fn parse_timeout(timeout_str: &str) -> Result<Duration> {
    let timeout_str = timeout_str.trim();
    let invalid = || MysqlTestError::Config(format!("Invalid timeout value: {}", timeout_str));

    let secs = if let Some(num_str) = timeout_str.strip_suffix('s') {
        num_str.trim().parse::<u64>().map_err(|_| invalid())?
    } else if let Some(num_str) = timeout_str.strip_suffix('m') {
        let minutes = num_str.trim().parse::<u64>().map_err(|_| invalid())?;
        minutes.checked_mul(60).ok_or_else(invalid)?
    } else {
        // Default to seconds if no unit specified
        timeout_str.parse::<u64>().map_err(|_| invalid())?
    };

    check_timeout(Duration::from_secs(secs))
}

fn check_timeout(timeout: Duration) -> Result<Duration> {
    if timeout > Duration::from_secs(MAX_TIMEOUT_SECS) {
        return Err(MysqlTestError::Config(format!(
            "timeout of {}s exceeds the maximum of {}s",
            timeout.as_secs(),
            MAX_TIMEOUT_SECS
        )));
    }
    Ok(timeout)
}
