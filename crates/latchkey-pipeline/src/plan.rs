use latchkey_protocol::StageId;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStage {
    pub id: StageId,
    pub title: String,
    pub weight: f64,
}

impl PipelineStage {
    pub fn new(id: impl Into<StageId>, title: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            weight,
        }
    }
}

/// Ordered stage sequence. Immutable once a run starts; weights
/// conventionally sum to 1.0 but the driver does not require it.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    stages: Vec<PipelineStage>,
}

impl StagePlan {
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        for stage in &stages {
            assert!(
                stage.weight > 0.0 && stage.weight <= 1.0,
                "stage weight must be in (0, 1]: {} has {}",
                stage.id,
                stage.weight
            );
        }
        Self { stages }
    }

    /// The default ten-stage unlock sequence.
    pub fn standard_unlock() -> Self {
        Self::new(vec![
            PipelineStage::new("initialize", "Initializing", 0.05),
            PipelineStage::new("check-device", "Checking Device", 0.05),
            PipelineStage::new("find-kernel-base", "Finding Kernel Base", 0.10),
            PipelineStage::new("leak-kernel-info", "Leaking Kernel Info", 0.10),
            PipelineStage::new("establish-kernel-rw", "Establishing Kernel R/W", 0.15),
            PipelineStage::new("bypass-pac", "Bypassing PAC", 0.10),
            PipelineStage::new("escalate-privileges", "Escalating Privileges", 0.10),
            PipelineStage::new("patch-kernel", "Patching Kernel", 0.10),
            PipelineStage::new("install-package-managers", "Installing Package Managers", 0.15),
            PipelineStage::new("finalize", "Finalizing", 0.10),
        ])
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
