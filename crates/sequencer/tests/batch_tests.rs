use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use generation::providers::mock::{MockAnalyst, MockConfig, MockOutcome};
use generation::{
    AnalysisRequest, ProviderError, ProviderKind, RefineRequest, RefinedPrompt, RewriteGoal,
    ShotAnalysis, ShotAnalyst,
};
use sequencer::{process_batch, refine_shots, BatchError, DraftStatus, StudioSession};
use storyboard::{remove_slot, DraftSlot, ImageRef, Project, Shot, SlotStatus};

fn frame(tag: &str) -> ImageRef {
    ImageRef::from_bytes("image/png", tag.as_bytes())
}

fn pair(tag: &str) -> DraftSlot {
    DraftSlot::transition(frame(&format!("{tag}-start")), frame(&format!("{tag}-end")))
}

fn canned(topic: &str) -> MockOutcome {
    MockOutcome::Analysis(ShotAnalysis {
        topic: topic.to_string(),
        analysis: "a".to_string(),
        prompt: "p".to_string(),
        telemetry: None,
    })
}

#[test]
fn two_pairs_become_shots_five_and_six() {
    let mut project = Project::new("Concrete Scenario");
    project.set_starting_sequence(5);
    project.draft_slots = vec![pair("ab"), pair("cd")];

    let session = StudioSession::new(project);
    let analyst = MockAnalyst::new(MockConfig::default());

    let report = process_batch(&session, &analyst, "style").unwrap();
    assert_eq!(report.created.len(), 2);
    assert!(report.failures.is_empty());

    let updated = session.snapshot();
    let orders: Vec<i64> = updated
        .sorted_shots()
        .iter()
        .map(|s| s.sequence_order)
        .collect();
    assert_eq!(orders, vec![5, 6]);

    // Both slots completed, so the queue compacts down to one blank row.
    assert_eq!(updated.draft_slots.len(), 1);
    assert!(updated.draft_slots[0].is_blank());
    assert_eq!(updated.draft_slots[0].status, SlotStatus::Idle);
    assert!(!session.is_busy());
}

#[test]
fn a_failure_mid_batch_never_aborts_the_run() {
    let mut project = Project::new("Partial Failure");
    project.draft_slots = vec![pair("one"), pair("two"), pair("three")];
    let failing_slot = project.draft_slots[1].id;

    let session = StudioSession::new(project);
    let analyst = MockAnalyst::new(MockConfig {
        scripted: vec![
            canned("first"),
            MockOutcome::Failure("service unavailable".to_string()),
            canned("third"),
        ],
    });

    let report = process_batch(&session, &analyst, "style").unwrap();
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, failing_slot);

    let updated = session.snapshot();
    // Successes number 1 and 2 with no gap; the failed slot consumed nothing.
    let orders: Vec<i64> = updated
        .sorted_shots()
        .iter()
        .map(|s| s.sequence_order)
        .collect();
    assert_eq!(orders, vec![1, 2]);
    let topics: Vec<&str> = updated
        .sorted_shots()
        .iter()
        .map(|s| s.topic.as_str())
        .collect();
    assert_eq!(topics, vec!["first", "third"]);

    // The error slot survives compaction for inspection and retry.
    assert_eq!(updated.draft_slots.len(), 1);
    assert_eq!(updated.draft_slots[0].id, failing_slot);
    assert_eq!(updated.draft_slots[0].status, SlotStatus::Error);
    assert!(!session.is_busy());
}

#[test]
fn sequence_numbers_continue_from_existing_shots() {
    let mut project = Project::new("Continuation");
    project
        .shots
        .push(Shot::new(1, "t", "a", "p", frame("x"), frame("y")));
    project
        .shots
        .push(Shot::new(2, "t", "a", "p", frame("x"), frame("y")));
    project.draft_slots = vec![pair("next"), pair("after")];

    let session = StudioSession::new(project);
    let analyst = MockAnalyst::new(MockConfig::default());
    let report = process_batch(&session, &analyst, "style").unwrap();

    let sequences: Vec<i64> = report.created.iter().map(|(_, _, seq)| *seq).collect();
    assert_eq!(sequences, vec![3, 4]);
}

#[test]
fn zero_eligible_slots_is_a_no_op() {
    let mut project = Project::new("Nothing To Do");
    // One half-filled slot and one blank: neither is eligible.
    project.draft_slots = vec![DraftSlot::new(Some(frame("a")), None), DraftSlot::empty()];
    let slot_ids: Vec<_> = project.draft_slots.iter().map(|s| s.id).collect();

    let session = StudioSession::new(project);
    let analyst = MockAnalyst::new(MockConfig {
        scripted: vec![MockOutcome::Failure("must not be called".to_string())],
    });

    let report = process_batch(&session, &analyst, "style").unwrap();
    assert!(report.is_empty());
    assert!(session.rx_events.try_recv().is_err());

    let updated = session.snapshot();
    assert!(updated.shots.is_empty());
    assert_eq!(
        updated.draft_slots.iter().map(|s| s.id).collect::<Vec<_>>(),
        slot_ids
    );
}

#[test]
fn events_stream_processing_before_completion_per_slot() {
    let mut project = Project::new("Events");
    project.draft_slots = vec![pair("only")];
    let slot_id = project.draft_slots[0].id;

    let session = StudioSession::new(project);
    let analyst = MockAnalyst::new(MockConfig::default());
    process_batch(&session, &analyst, "style").unwrap();

    let first = session.rx_events.try_recv().unwrap();
    assert_eq!(first.slot_id, slot_id);
    assert!(matches!(first.status, DraftStatus::Processing));
    let second = session.rx_events.try_recv().unwrap();
    assert_eq!(second.slot_id, slot_id);
    assert!(matches!(second.status, DraftStatus::Completed { sequence: 1, .. }));
    assert!(session.rx_events.try_recv().is_err());
}

/// Blocks each analyze call until the test releases it, so the test can
/// observe and mutate mid-batch state.
struct GatedAnalyst {
    gate: Receiver<()>,
}

impl ShotAnalyst for GatedAnalyst {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Custom("gated".to_string())
    }

    fn model_name(&self) -> &str {
        "gated"
    }

    fn analyze(&self, _request: &AnalysisRequest) -> Result<ShotAnalysis, ProviderError> {
        self.gate
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| ProviderError::Other("gate closed".to_string()))?;
        Ok(ShotAnalysis {
            topic: "gated".to_string(),
            analysis: "a".to_string(),
            prompt: "p".to_string(),
            telemetry: None,
        })
    }

    fn refine(&self, _request: &RefineRequest) -> Result<Vec<RefinedPrompt>, ProviderError> {
        Ok(Vec::new())
    }
}

#[test]
fn busy_flag_gates_a_second_batch_and_always_releases() {
    let mut project = Project::new("Busy");
    project.draft_slots = vec![pair("one"), pair("two")];
    let second_slot = project.draft_slots[1].id;

    let session = StudioSession::new(project);
    let (release, gate) = bounded(0);

    let runner = {
        let session = session.clone();
        std::thread::spawn(move || process_batch(&session, &GatedAnalyst { gate }, "style"))
    };

    // Wait until the first slot is visibly processing.
    let event = session
        .rx_events
        .recv_timeout(Duration::from_secs(5))
        .unwrap();
    assert!(matches!(event.status, DraftStatus::Processing));
    assert!(session.is_busy());

    // A second batch is rejected while the first is in flight.
    let analyst = MockAnalyst::new(MockConfig::default());
    assert!(matches!(
        process_batch(&session, &analyst, "style"),
        Err(BatchError::Busy)
    ));

    // Concurrent edit: the second captured slot disappears before its turn.
    session.apply(|p| remove_slot(&mut p.draft_slots, second_slot));

    release.send(()).unwrap();
    let report = runner.join().unwrap().unwrap();

    // Only the first item ran; the vanished slot was skipped silently.
    assert_eq!(report.created.len(), 1);
    assert!(report.failures.is_empty());
    assert!(!session.is_busy());
}

#[test]
fn refine_rewrites_prompts_in_place() {
    let mut project = Project::new("Refine");
    project
        .shots
        .push(Shot::new(2, "b", "a", "second beat", frame("x"), frame("y")));
    project
        .shots
        .push(Shot::new(1, "a", "a", "first beat", frame("x"), frame("y")));

    let session = StudioSession::new(project);
    let analyst = MockAnalyst::new(MockConfig::default());
    let updated = refine_shots(
        &session,
        &analyst,
        RewriteGoal::Aesthetic {
            directive: "noir".to_string(),
        },
    )
    .unwrap();
    assert_eq!(updated, 2);

    let snapshot = session.snapshot();
    let prompts: Vec<&str> = snapshot
        .sorted_shots()
        .iter()
        .map(|s| s.action_prompt.as_str())
        .collect();
    assert_eq!(
        prompts,
        vec!["Refined (noir): first beat", "Refined (noir): second beat"]
    );
}
