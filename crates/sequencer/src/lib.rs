use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use generation::{
    AnalysisRequest, PromptSeed, RefineRequest, RewriteGoal, ShotAnalyst,
};
use storyboard::{compact, ImageRef, Project, Shot, ShotId, SlotId, SlotStatus};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("a drafting batch is already running for this project")]
    Busy,
    #[error("prompt rewrite failed: {0}")]
    Rewrite(String),
}

/// Per-slot progress, observable while a batch is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEvent {
    pub slot_id: SlotId,
    pub status: DraftStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DraftStatus {
    Processing,
    Completed { shot_id: ShotId, sequence: i64 },
    Failed { message: String },
}

/// Shared editing/processing state for one open project.
///
/// All mutation goes through `apply`, which locks and hands the closure the
/// latest project state; concurrent callers never race on a stale snapshot.
/// The busy flag gates a second batch from starting while one is in flight.
#[derive(Clone)]
pub struct StudioSession {
    project: Arc<Mutex<Project>>,
    busy: Arc<AtomicBool>,
    tx_events: Sender<DraftEvent>,
    pub rx_events: Receiver<DraftEvent>,
}

impl StudioSession {
    pub fn new(project: Project) -> Self {
        let (tx_events, rx_events) = unbounded();
        Self {
            project: Arc::new(Mutex::new(project)),
            busy: Arc::new(AtomicBool::new(false)),
            tx_events,
            rx_events,
        }
    }

    /// Runs a mutation against the latest state and stamps `last_modified`.
    pub fn apply<T>(&self, mutate: impl FnOnce(&mut Project) -> T) -> T {
        let mut project = self.project.lock();
        let out = mutate(&mut project);
        project.touch();
        out
    }

    pub fn snapshot(&self) -> Project {
        self.project.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn begin_batch(&self) -> Result<BusyGuard, BatchError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BatchError::Busy);
        }
        Ok(BusyGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    fn emit(&self, slot_id: SlotId, status: DraftStatus) {
        let _ = self.tx_events.send(DraftEvent { slot_id, status });
    }
}

/// Clears the busy flag on drop, so every exit path out of a batch run
/// releases it.
struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// (slot, shot, sequence number) per success, in processing order.
    pub created: Vec<(SlotId, ShotId, i64)>,
    /// (slot, error message) per failure, in processing order.
    pub failures: Vec<(SlotId, String)>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.failures.is_empty()
    }
}

/// Runs the captured eligible slots through the analyst, strictly one at a
/// time, appending a numbered shot per success and continuing past per-item
/// failures. Ends with compaction.
///
/// Sequence numbers are computed per item from the live project state, so a
/// shot deleted elsewhere between items is reflected in the numbering of
/// later items. Slots edited out of eligibility (or removed) mid-run are
/// skipped. Items added to the queue during the run are not picked up.
pub fn process_batch(
    session: &StudioSession,
    analyst: &dyn ShotAnalyst,
    style_directive: &str,
) -> Result<BatchReport, BatchError> {
    let eligible = session.snapshot().eligible_slot_ids();
    if eligible.is_empty() {
        return Ok(BatchReport::default());
    }

    let _busy = session.begin_batch()?;
    let mut report = BatchReport::default();

    for slot_id in eligible {
        let images = session.apply(|project| {
            let slot = project.draft_slots.iter_mut().find(|s| s.id == slot_id)?;
            if !slot.is_eligible() {
                return None;
            }
            slot.status = SlotStatus::Processing;
            Some((slot.source.clone()?, slot.target.clone()?))
        });
        let Some((source, target)) = images else {
            continue;
        };
        session.emit(slot_id, DraftStatus::Processing);

        let request = AnalysisRequest {
            source: source.clone(),
            target: target.clone(),
            style_directive: style_directive.to_string(),
        };
        match analyst.analyze(&request) {
            Ok(analysis) => {
                if let Some(telemetry) = &analysis.telemetry {
                    debug!(
                        model = %telemetry.model,
                        tokens = telemetry.total_tokens,
                        latency_ms = telemetry.latency.map(|d| d.as_millis() as u64),
                        "analysis call finished"
                    );
                }
                let (shot_id, sequence) =
                    session.apply(|project| finalize_slot(project, slot_id, source, target, analysis));
                session.emit(slot_id, DraftStatus::Completed { shot_id, sequence });
                report.created.push((slot_id, shot_id, sequence));
            }
            Err(err) => {
                let message = err.to_string();
                warn!(slot = %slot_id, error = %message, "shot analysis failed; continuing batch");
                session.apply(|project| {
                    if let Some(slot) = project.draft_slots.iter_mut().find(|s| s.id == slot_id) {
                        slot.status = SlotStatus::Error;
                    }
                });
                session.emit(
                    slot_id,
                    DraftStatus::Failed {
                        message: message.clone(),
                    },
                );
                report.failures.push((slot_id, message));
            }
        }
    }

    session.apply(|project| compact(&mut project.draft_slots));
    Ok(report)
}

fn finalize_slot(
    project: &mut Project,
    slot_id: SlotId,
    source: ImageRef,
    target: ImageRef,
    analysis: generation::ShotAnalysis,
) -> (ShotId, i64) {
    let sequence = project.next_sequence_number();
    let shot = Shot::new(
        sequence,
        analysis.topic,
        analysis.analysis,
        analysis.prompt,
        source,
        target,
    );
    let shot_id = shot.id;
    project.shots.push(shot);
    if let Some(slot) = project.draft_slots.iter_mut().find(|s| s.id == slot_id) {
        slot.status = SlotStatus::Completed;
    }
    (shot_id, sequence)
}

/// Runs a whole-sequence prompt rewrite and folds the results back in by
/// shot id. Returns how many prompts changed.
pub fn refine_shots(
    session: &StudioSession,
    analyst: &dyn ShotAnalyst,
    goal: RewriteGoal,
) -> Result<usize, BatchError> {
    let snapshot = session.snapshot();
    let prompts: Vec<PromptSeed> = snapshot
        .sorted_shots()
        .into_iter()
        .map(|shot| PromptSeed {
            id: shot.id,
            topic: shot.topic.clone(),
            prompt: shot.action_prompt.clone(),
        })
        .collect();
    if prompts.is_empty() {
        return Ok(0);
    }
    let refined = analyst
        .refine(&RefineRequest { goal, prompts })
        .map_err(|err| BatchError::Rewrite(err.to_string()))?;
    Ok(session.apply(|project| {
        let mut updated = 0;
        for entry in &refined {
            if let Some(shot) = project.shots.iter_mut().find(|s| s.id == entry.id) {
                shot.action_prompt = entry.prompt.clone();
                updated += 1;
            }
        }
        updated
    }))
}
