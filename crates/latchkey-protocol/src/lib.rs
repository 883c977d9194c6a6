//! Request/response contract between the orchestration layer and the
//! privilege backend. Everything privileged lives behind [`backend::DeviceBackend`];
//! this crate only defines the shapes that cross the seam.

pub mod backend;
pub mod entry;
pub mod error;
pub mod ids;

pub use backend::{BackendInfo, BackendKind, DeviceBackend, FileAccess, ShellExecutor, StageRunner};
pub use entry::{FileEntry, StageReport};
pub use error::{BackendError, BackendResult, BACKEND_UNREACHABLE_MESSAGE};
pub use ids::StageId;
