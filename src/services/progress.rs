// Progress Coordinator
// State machine for one progress-tracked run: an ordered list of named stages,
// per-stage status/percentage/detail, overall completion as the mean of stage
// percentages, and a remaining-time estimate.
//
// The slot is owned by the coordinator instance (no ambient state), so
// separate coordinators never interfere. Interior locking exists only because
// the stage handoff and the delayed hide run on spawned timers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::models::{ProgressSnapshot, Stage, StageDefinition, StageStatus};
use crate::services::sentence_segmenter::sentence_count;

/// Overall progress above which the velocity-based estimate replaces the seed.
const VELOCITY_ESTIMATE_FLOOR: f64 = 5.0;
/// Delay before the next stage flips to Processing after a completion.
const HANDOFF_DELAY_MS: u64 = 120;

/// Observer notified after every state mutation.
pub trait ProgressListener: Send + Sync {
    fn on_update(&self, snapshot: &ProgressSnapshot);
}

struct RunState {
    generation: u64,
    stages: Vec<Stage>,
    current_stage_id: Option<String>,
    overall_progress: f64,
    started_at: Instant,
    estimated_seconds_remaining: Option<f64>,
}

impl RunState {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            stages: self.stages.clone(),
            current_stage_id: self.current_stage_id.clone(),
            overall_progress: self.overall_progress,
            estimated_seconds_remaining: self.estimated_seconds_remaining,
        }
    }

    fn recompute_overall(&mut self) {
        self.overall_progress = if self.stages.is_empty() {
            0.0
        } else {
            self.stages.iter().map(|s| s.progress).sum::<f64>() / self.stages.len() as f64
        };
    }
}

/// Calibrated per-unit cost used to seed the initial estimate. Unrecognized
/// stage kinds cost the default.
fn per_unit_seconds(stage_id: &str) -> f64 {
    match stage_id {
        "parsing" => 0.1,
        "analysis" => 0.3,
        "research" => 2.0,
        _ => 1.0,
    }
}

#[derive(Clone)]
pub struct ProgressCoordinator {
    state: Arc<Mutex<Option<RunState>>>,
    generation: Arc<AtomicU64>,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl Default for ProgressCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            listener: None,
        }
    }

    pub fn with_listener(listener: Arc<dyn ProgressListener>) -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            listener: Some(listener),
        }
    }

    /// Begin a new run. Any active run is discarded unconditionally.
    ///
    /// When `input_hint` is given, the initial remaining-time estimate is the
    /// summed per-stage cost of its sentence count; the estimate is replaced
    /// by velocity extrapolation once the run is minimally underway.
    pub fn start(&self, definitions: &[StageDefinition], input_hint: Option<&str>) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let stages: Vec<Stage> = definitions
            .iter()
            .map(|d| Stage {
                id: d.id.clone(),
                label: d.label.clone(),
                status: StageStatus::Pending,
                progress: 0.0,
                detail: None,
            })
            .collect();

        let estimated = input_hint.map(|hint| {
            let unit_count = sentence_count(hint) as f64;
            definitions
                .iter()
                .map(|d| unit_count * per_unit_seconds(&d.id))
                .sum()
        });

        let state = RunState {
            generation,
            current_stage_id: definitions.first().map(|d| d.id.clone()),
            stages,
            overall_progress: 0.0,
            started_at: Instant::now(),
            estimated_seconds_remaining: estimated,
        };

        let snapshot = {
            let mut guard = self.state.lock().unwrap();
            if guard.is_some() {
                debug!("[PROGRESS] Discarding previous run state");
            }
            *guard = Some(state);
            guard.as_ref().map(|s| s.snapshot())
        };
        self.notify(snapshot);
    }

    /// Update one stage's progress. Clamped to [0,100]; non-decreasing while
    /// the stage is Processing; a completed or failed stage is never revisited.
    pub fn advance(&self, stage_id: &str, progress: f64, detail: Option<&str>) {
        let snapshot = {
            let mut guard = self.state.lock().unwrap();
            let Some(state) = guard.as_mut() else {
                warn!("[PROGRESS] advance({}) with no active run", stage_id);
                return;
            };
            let Some(stage) = state.stages.iter_mut().find(|s| s.id == stage_id) else {
                warn!("[PROGRESS] advance on unknown stage: {}", stage_id);
                return;
            };
            if matches!(stage.status, StageStatus::Completed | StageStatus::Error) {
                return;
            }

            let clamped = progress.clamp(0.0, 100.0).max(stage.progress);
            stage.progress = clamped;
            stage.status = if clamped >= 100.0 {
                StageStatus::Completed
            } else {
                StageStatus::Processing
            };
            if let Some(d) = detail {
                stage.detail = Some(d.to_string());
            }

            state.recompute_overall();
            if state.overall_progress > VELOCITY_ESTIMATE_FLOOR {
                let elapsed = state.started_at.elapsed().as_secs_f64();
                let overall = state.overall_progress;
                state.estimated_seconds_remaining = Some(elapsed / overall * (100.0 - overall));
            }

            Some(state.snapshot())
        };
        self.notify(snapshot);
    }

    /// Finish a stage and, when a next stage exists, hand off to it after a
    /// short non-blocking delay so the display transitions smoothly.
    pub fn complete(&self, stage_id: &str) {
        self.advance(stage_id, 100.0, None);

        let handoff = {
            let mut guard = self.state.lock().unwrap();
            let Some(state) = guard.as_mut() else { return };
            let Some(index) = state.stages.iter().position(|s| s.id == stage_id) else {
                return;
            };
            match state.stages.get(index + 1) {
                Some(next) => {
                    let next_id = next.id.clone();
                    state.current_stage_id = Some(next_id.clone());
                    Some((state.generation, next_id))
                }
                None => None,
            }
        };

        let Some((generation, next_id)) = handoff else { return };

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let coordinator = self.clone();
            handle.spawn(async move {
                tokio::time::sleep(Duration::from_millis(HANDOFF_DELAY_MS)).await;
                coordinator.apply_handoff(generation, &next_id);
            });
        } else {
            self.apply_handoff(generation, &next_id);
        }
    }

    fn apply_handoff(&self, generation: u64, stage_id: &str) {
        let snapshot = {
            let mut guard = self.state.lock().unwrap();
            let Some(state) = guard.as_mut() else { return };
            if state.generation != generation {
                return;
            }
            let Some(stage) = state.stages.iter_mut().find(|s| s.id == stage_id) else {
                return;
            };
            if stage.status != StageStatus::Pending {
                return;
            }
            stage.status = StageStatus::Processing;
            stage.progress = stage.progress.max(1.0);
            stage.detail = Some("Starting…".to_string());
            state.recompute_overall();
            Some(state.snapshot())
        };
        self.notify(snapshot);
    }

    /// Mark one stage as failed. Completed stages keep their state; their
    /// results remain usable by the caller until `hide`.
    pub fn fail(&self, stage_id: &str, message: &str) {
        let snapshot = {
            let mut guard = self.state.lock().unwrap();
            let Some(state) = guard.as_mut() else {
                warn!("[PROGRESS] fail({}) with no active run", stage_id);
                return;
            };
            let Some(stage) = state.stages.iter_mut().find(|s| s.id == stage_id) else {
                warn!("[PROGRESS] fail on unknown stage: {}", stage_id);
                return;
            };
            stage.status = StageStatus::Error;
            stage.detail = Some(message.to_string());
            state.estimated_seconds_remaining = None;
            Some(state.snapshot())
        };
        self.notify(snapshot);
    }

    /// Clear all run state. Idempotent.
    pub fn hide(&self) {
        {
            let mut guard = self.state.lock().unwrap();
            *guard = None;
        }
        self.notify(Some(ProgressSnapshot {
            stages: Vec::new(),
            current_stage_id: None,
            overall_progress: 0.0,
            estimated_seconds_remaining: None,
        }));
    }

    /// Hide after a delay unless a newer run has started in the meantime.
    pub fn schedule_hide(&self, delay: Duration) {
        let generation = self.generation.load(Ordering::Relaxed);
        let coordinator = self.clone();
        let hide_if_current = move || {
            let clear = {
                let guard = coordinator.state.lock().unwrap();
                guard.as_ref().map(|s| s.generation == generation).unwrap_or(false)
            };
            if clear {
                coordinator.hide();
            }
        };

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                hide_if_current();
            });
        } else {
            hide_if_current();
        }
    }

    pub fn snapshot(&self) -> Option<ProgressSnapshot> {
        self.state.lock().unwrap().as_ref().map(|s| s.snapshot())
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().is_some()
    }

    pub fn current_stage_id(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|s| s.current_stage_id.clone())
    }

    fn notify(&self, snapshot: Option<ProgressSnapshot>) {
        if let (Some(listener), Some(snapshot)) = (self.listener.as_ref(), snapshot) {
            listener.on_update(&snapshot);
        }
    }
}
