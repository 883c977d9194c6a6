use latchkey_protocol::StageId;

pub const STATUS_READY: &str = "Ready to unlock";
pub const STATUS_COMPLETE: &str = "Device successfully unlocked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelinePhase {
    #[default]
    Idle,
    Running,
    Complete,
    Failed,
}

impl PipelinePhase {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Pull-based view of the driver's mutable state. Mutated only by the
/// driver; terminal once `Complete` or `Failed` until the next run resets it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub phase: PipelinePhase,
    pub current_stage: Option<StageId>,
    pub current_stage_title: Option<String>,
    pub status_line: String,
    pub stage_index: usize,
    pub stage_total: usize,
    pub progress: f64,
    pub failure: Option<String>,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            phase: PipelinePhase::Idle,
            current_stage: None,
            current_stage_title: None,
            status_line: STATUS_READY.to_owned(),
            stage_index: 0,
            stage_total: 0,
            progress: 0.0,
            failure: None,
        }
    }
}
