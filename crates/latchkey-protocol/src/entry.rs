use serde::{Deserialize, Serialize};

/// Read-only projection of one directory entry as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: i64,
    pub permissions: String,
    pub owner: String,
    pub group: String,
}

/// Outcome of one privileged stage. Transport failure is expressed as
/// `Err(BackendError)` by the caller; a stage that ran but did not succeed
/// comes back as `Ok` with `success == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub success: bool,
    pub message: String,
}

impl StageReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
