use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entry::{FileEntry, StageReport};
use crate::error::BackendResult;
use crate::ids::StageId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Host,
    Other(String),
}

#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run_stage(&self, stage: &StageId) -> BackendResult<StageReport>;
}

#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Executes one shell line and returns the raw stdout+stderr text.
    /// `Err` means the backend itself failed, not that the command printed
    /// to stderr or exited non-zero.
    async fn execute_line(&self, line: &str) -> BackendResult<String>;
}

#[async_trait]
pub trait FileAccess: Send + Sync {
    async fn list_directory(&self, path: &str) -> BackendResult<Vec<FileEntry>>;
    async fn is_directory(&self, path: &str) -> BackendResult<bool>;
    async fn read_file(&self, path: &str) -> BackendResult<String>;
    async fn write_file(&self, path: &str, contents: &str) -> BackendResult<()>;
    async fn create_directory(&self, path: &str) -> BackendResult<()>;
    async fn delete_entry(&self, path: &str) -> BackendResult<()>;
    async fn move_entry(&self, from: &str, to: &str) -> BackendResult<()>;
    async fn copy_entry(&self, from: &str, to: &str) -> BackendResult<()>;
    async fn set_permissions(&self, path: &str, mode: &str) -> BackendResult<()>;
    async fn set_owner(&self, path: &str, owner: &str, group: Option<&str>) -> BackendResult<()>;
    async fn search(&self, path: &str, pattern: &str) -> BackendResult<Vec<String>>;
}

#[async_trait]
pub trait BackendInfo: Send + Sync {
    fn kind(&self) -> BackendKind;
    async fn health_check(&self) -> BackendResult<()>;
}

pub trait DeviceBackend:
    StageRunner + ShellExecutor + FileAccess + BackendInfo + Send + Sync
{
}

impl<T> DeviceBackend for T where
    T: StageRunner + ShellExecutor + FileAccess + BackendInfo + Send + Sync
{
}

impl std::fmt::Debug for dyn DeviceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBackend")
            .field("kind", &self.kind())
            .finish()
    }
}
