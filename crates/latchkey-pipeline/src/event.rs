use latchkey_protocol::StageId;

use crate::log::LogEntry;

/// Push-based change notifications broadcast while a run is in flight.
/// Pull-based observers use [`crate::driver::PipelineDriver::snapshot`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted {
        index: usize,
        total: usize,
        stage: StageId,
        title: String,
    },
    StageCompleted {
        stage: StageId,
        message: String,
    },
    Log(LogEntry),
    Progress(f64),
    RunCompleted,
    RunFailed {
        message: String,
    },
}
