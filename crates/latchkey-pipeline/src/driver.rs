use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use latchkey_protocol::DeviceBackend;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::event::PipelineEvent;
use crate::log::{LogBuffer, LogEntry, LogLevel};
use crate::plan::StagePlan;
use crate::state::{PipelinePhase, PipelineSnapshot, STATUS_COMPLETE};

pub const DEFAULT_EVENT_BUFFER: usize = 256;
pub const DEFAULT_FINALIZE_DELAY_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub event_buffer: usize,
    pub finalize_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
            finalize_delay: Duration::from_secs(DEFAULT_FINALIZE_DELAY_SECS),
        }
    }
}

/// Post-completion side effect, fired once after `finalize_delay` on a
/// fully successful run. Wired by the composition root; typically a
/// restart-service signal.
#[async_trait]
pub trait FinalizeHook: Send + Sync {
    async fn finalize(&self);
}

/// Result of one `run()` invocation. `finalize` is present only when every
/// stage succeeded; awaiting it is optional.
pub struct PipelineRun {
    pub snapshot: PipelineSnapshot,
    pub finalize: Option<JoinHandle<()>>,
}

pub struct PipelineDriver {
    backend: Arc<dyn DeviceBackend>,
    plan: StagePlan,
    config: PipelineConfig,
    finalize_hook: Option<Arc<dyn FinalizeHook>>,
    state: Mutex<PipelineSnapshot>,
    logs: Mutex<LogBuffer>,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineDriver {
    pub fn new(backend: Arc<dyn DeviceBackend>, plan: StagePlan) -> Self {
        Self::with_config(backend, plan, PipelineConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn DeviceBackend>,
        plan: StagePlan,
        config: PipelineConfig,
    ) -> Self {
        assert!(config.event_buffer > 0, "event_buffer must be greater than 0");
        let (events, _receiver) = broadcast::channel(config.event_buffer);
        Self {
            backend,
            plan,
            config,
            finalize_hook: None,
            state: Mutex::new(PipelineSnapshot::default()),
            logs: Mutex::new(LogBuffer::default()),
            events,
        }
    }

    pub fn with_finalize_hook(mut self, hook: Arc<dyn FinalizeHook>) -> Self {
        self.finalize_hook = Some(hook);
        self
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state
            .lock()
            .expect("pipeline state lock poisoned")
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs
            .lock()
            .expect("pipeline log lock poisoned")
            .snapshot()
    }

    pub fn clear_logs(&self) {
        self.logs
            .lock()
            .expect("pipeline log lock poisoned")
            .clear();
    }

    /// Drives every stage of the plan in order, stopping at the first
    /// failure. A second call while a run is active is a silent no-op that
    /// returns the in-flight snapshot. Re-running after completion starts
    /// over from stage 0.
    pub async fn run(&self) -> PipelineRun {
        if let Some(in_flight) = self.begin_run() {
            return PipelineRun {
                snapshot: in_flight,
                finalize: None,
            };
        }

        self.log(LogLevel::Info, "Starting latchkey unlock pipeline");
        self.log(
            LogLevel::Info,
            format!("Plan: {} stages", self.plan.len()),
        );

        let total = self.plan.len();
        let mut progress = 0.0_f64;

        for (index, stage) in self.plan.stages().iter().enumerate() {
            {
                let mut state = self.state.lock().expect("pipeline state lock poisoned");
                state.current_stage = Some(stage.id.clone());
                state.current_stage_title = Some(stage.title.clone());
                state.stage_index = index;
                state.status_line = format!("Stage {} of {}", index + 1, total);
            }
            self.log(
                LogLevel::Info,
                format!("[{}/{}] {}...", index + 1, total, stage.title),
            );
            self.emit(PipelineEvent::StageStarted {
                index,
                total,
                stage: stage.id.clone(),
                title: stage.title.clone(),
            });

            let failure = match self.backend.run_stage(&stage.id).await {
                Ok(report) if report.success => {
                    self.log(
                        LogLevel::Success,
                        format!("{}: {}", stage.title, report.message),
                    );
                    self.emit(PipelineEvent::StageCompleted {
                        stage: stage.id.clone(),
                        message: report.message,
                    });
                    progress += stage.weight;
                    {
                        let mut state =
                            self.state.lock().expect("pipeline state lock poisoned");
                        state.progress = progress;
                    }
                    self.emit(PipelineEvent::Progress(progress));
                    None
                }
                Ok(report) => Some(report.message),
                Err(error) => Some(error.to_string()),
            };

            if let Some(message) = failure {
                self.log(
                    LogLevel::Error,
                    format!("{} failed: {}", stage.title, message),
                );
                {
                    let mut state = self.state.lock().expect("pipeline state lock poisoned");
                    state.phase = PipelinePhase::Failed;
                    state.status_line = message.clone();
                    state.failure = Some(message.clone());
                }
                self.emit(PipelineEvent::RunFailed { message });
                return PipelineRun {
                    snapshot: self.snapshot(),
                    finalize: None,
                };
            }
        }

        {
            let mut state = self.state.lock().expect("pipeline state lock poisoned");
            state.phase = PipelinePhase::Complete;
            state.progress = 1.0;
            state.current_stage = None;
            state.current_stage_title = None;
            state.status_line = STATUS_COMPLETE.to_owned();
        }
        self.emit(PipelineEvent::Progress(1.0));
        self.log(LogLevel::Success, "Unlock complete");
        self.log(LogLevel::Success, "Root access obtained");
        self.log(
            LogLevel::Info,
            format!(
                "Restarting services in {} seconds...",
                self.config.finalize_delay.as_secs()
            ),
        );
        self.emit(PipelineEvent::RunCompleted);

        PipelineRun {
            snapshot: self.snapshot(),
            finalize: Some(self.spawn_finalize_task()),
        }
    }

    /// Returns the in-flight snapshot when a run is already active,
    /// otherwise resets state for a fresh run.
    fn begin_run(&self) -> Option<PipelineSnapshot> {
        let mut state = self.state.lock().expect("pipeline state lock poisoned");
        if state.phase.is_running() {
            return Some(state.clone());
        }
        *state = PipelineSnapshot {
            phase: PipelinePhase::Running,
            stage_total: self.plan.len(),
            ..PipelineSnapshot::default()
        };
        None
    }

    fn spawn_finalize_task(&self) -> JoinHandle<()> {
        let delay = self.config.finalize_delay;
        let hook = self.finalize_hook.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match hook {
                Some(hook) => hook.finalize().await,
                None => tracing::info!("no finalize hook configured; skipping restart signal"),
            }
        })
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        self.logs
            .lock()
            .expect("pipeline log lock poisoned")
            .push(entry.clone());
        self.emit(PipelineEvent::Log(entry));
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }
}
