//! TOML + environment configuration for the latchkey workspace. A missing
//! config file yields pure defaults; unknown provider keys are rejected by
//! the backend factory in the app crate, not here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_LATCHKEY_CONFIG: &str = "LATCHKEY_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "./latchkey.toml";
pub const DEFAULT_BACKEND_PROVIDER: &str = "backend.host";
const DEFAULT_HOME_DIRECTORY: &str = "/var/root";
const DEFAULT_HISTORY_LIMIT: usize = 500;
const DEFAULT_EVENT_BUFFER: usize = 256;
const DEFAULT_FINALIZE_DELAY_SECS: u64 = 3;
const DEFAULT_HOST_SHELL: &str = "/bin/sh";
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_DIRECTORY: &str = "./.latchkey/logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LatchkeyConfig {
    #[serde(default = "default_backend_provider")]
    pub backend_provider: String,
    #[serde(default)]
    pub shell: ShellToml,
    #[serde(default)]
    pub pipeline: PipelineToml,
    #[serde(default)]
    pub backend: BackendToml,
    #[serde(default)]
    pub log: LogToml,
}

impl Default for LatchkeyConfig {
    fn default() -> Self {
        Self {
            backend_provider: default_backend_provider(),
            shell: ShellToml::default(),
            pipeline: PipelineToml::default(),
            backend: BackendToml::default(),
            log: LogToml::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShellToml {
    #[serde(default = "default_home_directory")]
    pub home_directory: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ShellToml {
    fn default() -> Self {
        Self {
            home_directory: default_home_directory(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineToml {
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_finalize_delay_secs")]
    pub finalize_delay_secs: u64,
}

impl Default for PipelineToml {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            finalize_delay_secs: default_finalize_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BackendToml {
    #[serde(default)]
    pub host: HostBackendToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostBackendToml {
    #[serde(default = "default_host_shell")]
    pub shell: String,
    #[serde(default)]
    pub toolkit: String,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for HostBackendToml {
    fn default() -> Self {
        Self {
            shell: default_host_shell(),
            toolkit: String::new(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl HostBackendToml {
    /// An empty toolkit string means "no privileged toolkit configured".
    pub fn toolkit_path(&self) -> Option<PathBuf> {
        let trimmed = self.toolkit.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogToml {
    #[serde(default = "default_log_directory")]
    pub directory: String,
}

impl Default for LogToml {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
        }
    }
}

pub fn load_from_env() -> Result<LatchkeyConfig, ConfigError> {
    load_from_path(config_path_from_env()?)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<LatchkeyConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(LatchkeyConfig::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|error| {
        ConfigError::configuration(format!(
            "failed to read config file '{}': {error}",
            path.display()
        ))
    })?;
    toml::from_str(&raw).map_err(|error| {
        ConfigError::configuration(format!(
            "failed to parse config file '{}': {error}",
            path.display()
        ))
    })
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_LATCHKEY_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                Ok(PathBuf::from(DEFAULT_CONFIG_PATH))
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(PathBuf::from(DEFAULT_CONFIG_PATH)),
        Err(_) => Err(ConfigError::configuration(
            "LATCHKEY_CONFIG contained invalid UTF-8",
        )),
    }
}

fn default_backend_provider() -> String {
    DEFAULT_BACKEND_PROVIDER.to_owned()
}

fn default_home_directory() -> String {
    DEFAULT_HOME_DIRECTORY.to_owned()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

fn default_finalize_delay_secs() -> u64 {
    DEFAULT_FINALIZE_DELAY_SECS
}

fn default_host_shell() -> String {
    DEFAULT_HOST_SHELL.to_owned()
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_log_directory() -> String {
    DEFAULT_LOG_DIRECTORY.to_owned()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{load_from_path, LatchkeyConfig, DEFAULT_BACKEND_PROVIDER};

    #[test]
    fn empty_document_parses_into_full_defaults() {
        let config: LatchkeyConfig = toml::from_str("").expect("parse empty config");

        assert_eq!(config.backend_provider, DEFAULT_BACKEND_PROVIDER);
        assert_eq!(config.shell.home_directory, "/var/root");
        assert_eq!(config.shell.history_limit, 500);
        assert_eq!(config.pipeline.event_buffer, 256);
        assert_eq!(config.pipeline.finalize_delay_secs, 3);
        assert_eq!(config.backend.host.shell, "/bin/sh");
        assert!(config.backend.host.toolkit_path().is_none());
        assert_eq!(config.backend.host.command_timeout_secs, 30);
        assert_eq!(config.log.directory, "./.latchkey/logs");
    }

    #[test]
    fn explicit_values_override_every_default() {
        let document = r#"
backend_provider = "backend.host"

[shell]
home_directory = "/var/mobile"
history_limit = 50

[pipeline]
event_buffer = 16
finalize_delay_secs = 1

[backend.host]
shell = "/bin/bash"
toolkit = "/usr/local/bin/latchkey-toolkit"
command_timeout_secs = 5

[log]
directory = "/tmp/latchkey-logs"
"#;
        let config: LatchkeyConfig = toml::from_str(document).expect("parse config");

        assert_eq!(config.shell.home_directory, "/var/mobile");
        assert_eq!(config.shell.history_limit, 50);
        assert_eq!(config.pipeline.event_buffer, 16);
        assert_eq!(config.pipeline.finalize_delay_secs, 1);
        assert_eq!(config.backend.host.shell, "/bin/bash");
        assert_eq!(
            config.backend.host.toolkit_path().expect("toolkit path"),
            std::path::PathBuf::from("/usr/local/bin/latchkey-toolkit")
        );
        assert_eq!(config.backend.host.command_timeout_secs, 5);
        assert_eq!(config.log.directory, "/tmp/latchkey-logs");
    }

    #[test]
    fn missing_file_yields_pure_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config =
            load_from_path(dir.path().join("does-not-exist.toml")).expect("load defaults");
        assert_eq!(config.backend_provider, DEFAULT_BACKEND_PROVIDER);
    }

    #[test]
    fn file_on_disk_round_trips_through_the_loader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("latchkey.toml");
        let mut file = std::fs::File::create(&path).expect("create config file");
        writeln!(file, "[shell]\nhistory_limit = 9").expect("write config");

        let config = load_from_path(&path).expect("load config");
        assert_eq!(config.shell.history_limit, 9);
        assert_eq!(config.shell.home_directory, "/var/root");
    }

    #[test]
    fn malformed_document_is_reported_with_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("latchkey.toml");
        std::fs::write(&path, "backend_provider = [").expect("write config");

        let error = load_from_path(&path).expect_err("parse must fail");
        assert!(error.to_string().contains("latchkey.toml"));
    }
}
