//! Configuration of the gosv-log plugin.
//!
//! Values come from, in increasing priority:
//!
//! 1. Defaults
//! 2. A configuration file (TOML or YAML, chosen by extension)
//! 3. `GOSV_LOG_*` environment variables
//!
//! # Configuration File Format (TOML)
//!
//! ```toml
//! project_dir = "/home/tester/ansible-vsphere-gos-validation"
//! log_root = "/var/log/gosv"
//! testcase_markers = ["linux", "windows"]
//! wrap_width = 50
//! console = true
//! ```
//!
//! # Environment Variables
//!
//! - `GOSV_LOG_PROJECT_DIR` - Project directory
//! - `GOSV_LOG_LOG_ROOT` - Directory holding the run log directories
//! - `GOSV_LOG_TESTCASE_MARKERS` - Comma-separated test case path markers
//! - `GOSV_LOG_WRAP_WIDTH` - Wrap width of the VM information table
//! - `GOSV_LOG_CONSOLE` - Print summaries to the console (true/false)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "GOSV_LOG";

/// Configuration for the gosv-log callback plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GosvLogConfig {
    /// Project directory; relative paths below resolve against it.
    pub project_dir: PathBuf,

    /// Directory holding run log directories. Defaults to `<project>/logs`.
    pub log_root: Option<PathBuf>,

    /// Name of the link to the active run directory.
    pub current_link_name: String,

    /// strftime format of run directory names.
    pub run_dir_format: String,

    pub full_debug_log: String,
    pub failed_tasks_log: String,
    pub results_log: String,
    pub results_yml: String,

    /// Testing vars file used when the run does not name one.
    pub testing_vars_file: PathBuf,

    /// A play whose source path contains one of these is a test case.
    pub testcase_markers: Vec<String>,

    /// Values longer than this are wrapped in the VM information table.
    pub wrap_width: usize,

    /// Whether summaries are printed to the console.
    pub console: bool,
}

fn default_run_dir_format() -> String {
    "%Y-%m-%d-%H-%M-%S".to_string()
}

fn default_testcase_markers() -> Vec<String> {
    vec!["linux".to_string(), "windows".to_string()]
}

fn default_wrap_width() -> usize {
    50
}

impl Default for GosvLogConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            log_root: None,
            current_link_name: "current".to_string(),
            run_dir_format: default_run_dir_format(),
            full_debug_log: "full_debug.log".to_string(),
            failed_tasks_log: "failed_tasks.log".to_string(),
            results_log: "results.log".to_string(),
            results_yml: "test_results.yml".to_string(),
            testing_vars_file: PathBuf::from("vars/test.yml"),
            testcase_markers: default_testcase_markers(),
            wrap_width: default_wrap_width(),
            console: true,
        }
    }
}

impl GosvLogConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> GosvLogConfigBuilder {
        GosvLogConfigBuilder::default()
    }

    /// Loads a file if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML or YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&content)?,
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            _ => return Err(Error::ConfigFormat(path.to_path_buf())),
        };
        debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Applies `GOSV_LOG_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(format!("{ENV_PREFIX}_PROJECT_DIR")) {
            self.project_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = env::var(format!("{ENV_PREFIX}_LOG_ROOT")) {
            self.log_root = Some(PathBuf::from(dir));
        }

        if let Ok(markers) = env::var(format!("{ENV_PREFIX}_TESTCASE_MARKERS")) {
            self.testcase_markers = markers
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }

        if let Ok(width) = env::var(format!("{ENV_PREFIX}_WRAP_WIDTH")) {
            match width.parse() {
                Ok(n) => self.wrap_width = n,
                Err(_) => warn!(value = %width, "ignoring invalid wrap width"),
            }
        }

        if let Ok(console) = env::var(format!("{ENV_PREFIX}_CONSOLE")) {
            self.console = matches!(console.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Checks values that would make the reports unreadable.
    pub fn validate(&self) -> Result<()> {
        if self.wrap_width == 0 {
            return Err(Error::InvalidConfig {
                key: "wrap_width".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.testcase_markers.is_empty() {
            return Err(Error::InvalidConfig {
                key: "testcase_markers".to_string(),
                message: "at least one marker is required".to_string(),
            });
        }
        let names = [
            &self.full_debug_log,
            &self.failed_tasks_log,
            &self.results_log,
            &self.results_yml,
            &self.current_link_name,
        ];
        if names.iter().any(|n| n.is_empty() || n.contains('/')) {
            return Err(Error::InvalidConfig {
                key: "file names".to_string(),
                message: "log file and link names must be plain non-empty names".to_string(),
            });
        }
        Ok(())
    }

    /// Directory holding the run log directories.
    pub fn log_root(&self) -> PathBuf {
        match &self.log_root {
            Some(root) => self.project_dir.join(root),
            None => self.project_dir.join("logs"),
        }
    }

    /// Default testing vars file, resolved against the project directory.
    pub fn default_testing_vars_file(&self) -> PathBuf {
        self.project_dir.join(&self.testing_vars_file)
    }

    /// Whether a play loaded from `path` is a test case.
    pub fn is_testcase_path(&self, path: &str) -> bool {
        self.testcase_markers
            .iter()
            .any(|marker| path.contains(marker.as_str()))
    }
}

/// Builder for `GosvLogConfig`.
#[derive(Debug, Default)]
pub struct GosvLogConfigBuilder {
    config: GosvLogConfig,
}

impl GosvLogConfigBuilder {
    /// Sets the project directory.
    #[must_use]
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.project_dir = dir.into();
        self
    }

    /// Sets the log root directory.
    #[must_use]
    pub fn log_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_root = Some(dir.into());
        self
    }

    /// Sets the run directory name format.
    #[must_use]
    pub fn run_dir_format(mut self, format: impl Into<String>) -> Self {
        self.config.run_dir_format = format.into();
        self
    }

    /// Sets the test case path markers.
    #[must_use]
    pub fn testcase_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.testcase_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the VM table wrap width.
    #[must_use]
    pub fn wrap_width(mut self, width: usize) -> Self {
        self.config.wrap_width = width;
        self
    }

    /// Enables or disables console output.
    #[must_use]
    pub fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> GosvLogConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GosvLogConfig::default();
        assert_eq!(config.testcase_markers, vec!["linux", "windows"]);
        assert_eq!(config.wrap_width, 50);
        assert_eq!(config.log_root(), PathBuf::from("./logs"));
        assert_eq!(
            config.default_testing_vars_file(),
            PathBuf::from("./vars/test.yml")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_testcase_path() {
        let config = GosvLogConfig::default();
        assert!(config.is_testcase_path("/gosv/linux/vgauth_check_service/vgauth_check_service.yml:1"));
        assert!(config.is_testcase_path("/gosv/windows/check_ip/check_ip.yml"));
        assert!(!config.is_testcase_path("/gosv/env_setup/env_setup.yml"));
    }

    #[test]
    fn test_builder() {
        let config = GosvLogConfig::builder()
            .project_dir("/gosv")
            .log_root("/tmp/gosv-logs")
            .testcase_markers(["linux"])
            .wrap_width(40)
            .console(false)
            .build();
        assert_eq!(config.log_root(), PathBuf::from("/tmp/gosv-logs"));
        assert_eq!(config.testcase_markers, vec!["linux"]);
        assert!(!config.console);
    }

    #[test]
    fn test_from_toml_and_yaml() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "wrap_width = 60\ntestcase_markers = [\"linux\"]").unwrap();
        let config = GosvLogConfig::from_file(toml_file.path()).unwrap();
        assert_eq!(config.wrap_width, 60);
        assert_eq!(config.full_debug_log, "full_debug.log");

        let mut yaml_file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(yaml_file, "console: false\nlog_root: /tmp/x").unwrap();
        let config = GosvLogConfig::from_file(yaml_file.path()).unwrap();
        assert!(!config.console);
        assert_eq!(config.log_root, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = GosvLogConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigFormat(_)));
    }

    #[test]
    fn test_validate_rejects_zero_width() {
        let config = GosvLogConfig::builder().wrap_width(0).build();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_override() {
        env::set_var("GOSV_LOG_TESTCASE_MARKERS", "linux, photon ,");
        env::set_var("GOSV_LOG_CONSOLE", "false");
        let mut config = GosvLogConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.testcase_markers, vec!["linux", "photon"]);
        assert!(!config.console);
        env::remove_var("GOSV_LOG_TESTCASE_MARKERS");
        env::remove_var("GOSV_LOG_CONSOLE");
    }
}
