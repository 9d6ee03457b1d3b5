//! Configuration loading from benchprobe.toml
//!
//! benchprobe configuration can be specified in a `benchprobe.toml` file in the
//! project root. The configuration is discovered by walking up from the
//! current directory. Relative `bootstrap` and `template_dir` paths are
//! relative to the directory holding the file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file name looked up by [`ProbeConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "benchprobe.toml";

/// benchprobe configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProbeConfig {
    /// Child process configuration
    #[serde(default)]
    pub launcher: LauncherConfig,
    /// Reflector configuration
    #[serde(default)]
    pub reflector: ReflectorConfig,
    /// Directory of the file this configuration was loaded from
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// How child processes are started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// PHP interpreter
    #[serde(default = "default_php_binary")]
    pub php_binary: String,
    /// Command the interpreter is run under (e.g. "blackfire run")
    #[serde(default)]
    pub php_wrapper: Option<String>,
    /// ini settings passed to the interpreter as `-d key=value`
    #[serde(default)]
    pub php_config: BTreeMap<String, String>,
    /// Script required before the benchmark file (e.g. "vendor/autoload.php")
    #[serde(default)]
    pub bootstrap: Option<String>,
    /// Deadline per child process (e.g. "60s", "none" to disable)
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Directory with replacement templates
    #[serde(default)]
    pub template_dir: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            php_binary: default_php_binary(),
            php_wrapper: None,
            php_config: BTreeMap::new(),
            bootstrap: None,
            timeout: default_timeout(),
            template_dir: None,
        }
    }
}

impl LauncherConfig {
    /// Parsed deadline, `None` when disabled
    pub fn timeout(&self) -> anyhow::Result<Option<Duration>> {
        if self.timeout.trim().eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        ProbeConfig::parse_duration(&self.timeout).map(Some)
    }
}

fn default_php_binary() -> String {
    benchprobe_launch::DEFAULT_PHP_BINARY.to_string()
}
fn default_timeout() -> String {
    "60s".to_string()
}

/// Reflector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectorConfig {
    /// Number of files reflected in parallel by `reflect_all`
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
        }
    }
}

fn default_jobs() -> usize {
    1
}

impl ProbeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        Self::discover_from(&std::env::current_dir().ok()?)
    }

    /// Try to discover and load configuration by walking up from `start`
    pub fn discover_from(start: &Path) -> Option<Self> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), error = %e, "ignoring unreadable configuration");
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Directory of the loaded file, `None` for built-in defaults
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Resolve a configured path against [`ProbeConfig::base_dir`]
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => path.as_ref().to_path_buf(),
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# benchprobe configuration

[launcher]
# PHP interpreter used for reflection child processes
php_binary = "php"
# Command to run the interpreter under (uncomment to enable)
# php_wrapper = "blackfire run"
# Script required before each benchmark file, relative to this file (uncomment to enable)
# bootstrap = "vendor/autoload.php"
# Deadline per child process ("500ms", "60s", "2m"), or "none"
timeout = "60s"
# Directory with replacement templates, relative to this file (uncomment to enable)
# template_dir = "benchprobe-templates"

[launcher.php_config]
# ini settings passed as -d key=value
# memory_limit = "1G"

[reflector]
# Number of files reflected in parallel
jobs = 1
"#
        .to_string()
    }

    /// Parse a deadline such as "500ms", "90s" or "2m"; a bare number is seconds
    pub fn parse_duration(text: &str) -> anyhow::Result<Duration> {
        let text = text.trim();
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split);

        let value: f64 = number
            .parse()
            .with_context(|| format!("Invalid duration \"{text}\""))?;
        let seconds = match unit.trim() {
            "" | "s" => value,
            "ms" => value / 1_000.0,
            "m" => value * 60.0,
            other => anyhow::bail!("Unknown duration unit \"{other}\" in \"{text}\""),
        };
        Duration::try_from_secs_f64(seconds).with_context(|| format!("Duration out of range \"{text}\""))
    }
}
