//! Staged unlock pipeline: an ordered, weighted stage plan driven to
//! completion with fail-fast abort semantics, a per-run log buffer, and
//! broadcast progress events.

pub mod driver;
pub mod event;
pub mod log;
pub mod plan;
pub mod state;

pub use driver::{
    FinalizeHook, PipelineConfig, PipelineDriver, PipelineRun, DEFAULT_EVENT_BUFFER,
    DEFAULT_FINALIZE_DELAY_SECS,
};
pub use event::PipelineEvent;
pub use log::{LogBuffer, LogEntry, LogLevel};
pub use plan::{PipelineStage, StagePlan};
pub use state::{PipelinePhase, PipelineSnapshot, STATUS_COMPLETE, STATUS_READY};
