//! Concrete [`DeviceBackend`] that runs against the local host through a
//! shell and `tokio::fs`. Used for development and tests; the privileged
//! stage helper is an optional external toolkit binary.

use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use latchkey_protocol::{
    BackendError, BackendInfo, BackendKind, BackendResult, FileAccess, FileEntry, ShellExecutor,
    StageId, StageReport, StageRunner,
};
use tokio::process::Command;

const DEFAULT_SHELL: &str = "/bin/sh";
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const ENV_LATCHKEY_SHELL: &str = "LATCHKEY_SHELL";
const ENV_LATCHKEY_TOOLKIT: &str = "LATCHKEY_TOOLKIT";
const ENV_LATCHKEY_COMMAND_TIMEOUT_SECS: &str = "LATCHKEY_COMMAND_TIMEOUT_SECS";

pub const NO_TOOLKIT_MESSAGE: &str = "no toolkit configured, stage skipped";

#[derive(Debug, Clone)]
pub struct HostBackendConfig {
    pub shell: PathBuf,
    pub toolkit: Option<PathBuf>,
    pub command_timeout: Duration,
}

impl Default for HostBackendConfig {
    fn default() -> Self {
        Self {
            shell: std::env::var_os(ENV_LATCHKEY_SHELL)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL)),
            toolkit: std::env::var_os(ENV_LATCHKEY_TOOLKIT).map(PathBuf::from),
            command_timeout: Duration::from_secs(
                std::env::var(ENV_LATCHKEY_COMMAND_TIMEOUT_SECS)
                    .ok()
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostBackend {
    config: HostBackendConfig,
}

impl HostBackend {
    pub fn new(config: HostBackendConfig) -> Self {
        Self { config }
    }

    async fn run_with_timeout(&self, mut command: Command) -> BackendResult<Output> {
        let future = command.output();
        match tokio::time::timeout(self.config.command_timeout, future).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(error)) => Err(BackendError::Process(format!(
                "failed to spawn command: {error}"
            ))),
            Err(_) => Err(BackendError::Process(format!(
                "command timed out after {} seconds",
                self.config.command_timeout.as_secs()
            ))),
        }
    }

    fn shell_command(&self, line: &str) -> Command {
        let mut command = Command::new(&self.config.shell);
        command.arg("-c").arg(line);
        command.kill_on_drop(true);
        command
    }
}

#[async_trait]
impl StageRunner for HostBackend {
    async fn run_stage(&self, stage: &StageId) -> BackendResult<StageReport> {
        let Some(toolkit) = &self.config.toolkit else {
            return Ok(StageReport::ok(NO_TOOLKIT_MESSAGE));
        };

        let mut command = Command::new(toolkit);
        command.arg("run-stage").arg(stage.as_str());
        command.kill_on_drop(true);
        let output = self.run_with_timeout(command).await?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = last_non_empty_line(&stdout).unwrap_or("OK");
            Ok(StageReport::ok(message))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = last_non_empty_line(&stderr)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("stage '{stage}' exited with {}", output.status));
            Ok(StageReport::failed(message))
        }
    }
}

#[async_trait]
impl ShellExecutor for HostBackend {
    async fn execute_line(&self, line: &str) -> BackendResult<String> {
        let output = self.run_with_timeout(self.shell_command(line)).await?;
        // Non-zero exit is not a backend failure; the shell surface shows
        // whatever the command printed.
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        Ok(text)
    }
}

#[async_trait]
impl FileAccess for HostBackend {
    async fn list_directory(&self, path: &str) -> BackendResult<Vec<FileEntry>> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|error| map_io_error(path, &error))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|error| map_io_error(path, &error))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let entry_path = entry.path().to_string_lossy().into_owned();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(error) => {
                    tracing::debug!(path = %entry_path, error = %error, "skipping unreadable entry");
                    continue;
                }
            };
            entries.push(FileEntry {
                name,
                path: entry_path,
                is_directory: metadata.is_dir(),
                size: metadata.len() as i64,
                permissions: permissions_string(metadata.permissions().mode(), metadata.is_dir()),
                owner: metadata.uid().to_string(),
                group: metadata.gid().to_string(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn is_directory(&self, path: &str) -> BackendResult<bool> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(map_io_error(path, &error)),
        }
    }

    async fn read_file(&self, path: &str) -> BackendResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|error| map_io_error(path, &error))
    }

    async fn write_file(&self, path: &str, contents: &str) -> BackendResult<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|error| map_io_error(path, &error))
    }

    async fn create_directory(&self, path: &str) -> BackendResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|error| map_io_error(path, &error))
    }

    async fn delete_entry(&self, path: &str) -> BackendResult<()> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|error| map_io_error(path, &error))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path)
                .await
                .map_err(|error| map_io_error(path, &error))
        } else {
            tokio::fs::remove_file(path)
                .await
                .map_err(|error| map_io_error(path, &error))
        }
    }

    async fn move_entry(&self, from: &str, to: &str) -> BackendResult<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|error| map_io_error(from, &error))
    }

    async fn copy_entry(&self, from: &str, to: &str) -> BackendResult<()> {
        // Recursive copy delegates to cp so directories behave like the
        // privileged toolkit's copy.
        let mut command = Command::new("cp");
        command.arg("-R").arg(from).arg(to);
        command.kill_on_drop(true);
        let output = self.run_with_timeout(command).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BackendError::Process(format!(
                "copy failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    async fn set_permissions(&self, path: &str, mode: &str) -> BackendResult<()> {
        let bits = u32::from_str_radix(mode, 8).map_err(|_| {
            BackendError::Protocol(format!("invalid permission mode '{mode}'"))
        })?;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(bits))
            .await
            .map_err(|error| map_io_error(path, &error))
    }

    async fn set_owner(&self, path: &str, owner: &str, group: Option<&str>) -> BackendResult<()> {
        let spec = match group {
            Some(group) => format!("{owner}:{group}"),
            None => owner.to_owned(),
        };
        let mut command = Command::new("chown");
        command.arg(spec).arg(path);
        command.kill_on_drop(true);
        let output = self.run_with_timeout(command).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BackendError::Process(format!(
                "chown failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    async fn search(&self, path: &str, pattern: &str) -> BackendResult<Vec<String>> {
        let mut command = Command::new("find");
        command.arg(path).arg("-name").arg(pattern);
        command.kill_on_drop(true);
        let output = self.run_with_timeout(command).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }
}

#[async_trait]
impl BackendInfo for HostBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Host
    }

    async fn health_check(&self) -> BackendResult<()> {
        let mut command = Command::new(&self.config.shell);
        command.arg("-c").arg("true");
        command.kill_on_drop(true);
        match tokio::time::timeout(self.config.command_timeout, command.output()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(error)) => Err(BackendError::Unreachable(format!(
                "shell '{}' could not be spawned: {error}",
                self.config.shell.display()
            ))),
            Err(_) => Err(BackendError::Unreachable(format!(
                "shell '{}' did not respond",
                self.config.shell.display()
            ))),
        }
    }
}

fn map_io_error(path: &str, error: &std::io::Error) -> BackendError {
    match error.kind() {
        std::io::ErrorKind::NotFound => BackendError::NotFound(path.to_owned()),
        std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(path.to_owned()),
        _ => BackendError::Process(format!("{path}: {error}")),
    }
}

fn last_non_empty_line(text: &str) -> Option<&str> {
    text.lines().rev().find(|line| !line.trim().is_empty())
}

fn permissions_string(mode: u32, is_dir: bool) -> String {
    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
