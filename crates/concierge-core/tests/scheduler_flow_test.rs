//! Scheduler flow tests: conflict detection, slot reuse after cancellation,
//! the permissive cancel stub, and the dual-write round trip.
//!
//! Run with: `cargo test --test scheduler_flow_test`

use std::sync::Arc;

use concierge_core::{
    DualStore, FlatFileStore, MemoryStore, RecordStore, ScheduleError, ScheduleRequest, Scheduler,
    UserInfo, COLLECTION_APPOINTMENTS, STATUS_CANCELLED, STATUS_SCHEDULED,
};

fn flat_only(dir: &std::path::Path) -> Arc<DualStore> {
    Arc::new(DualStore::new(
        None,
        FlatFileStore::new(dir).expect("open flat store"),
    ))
}

fn with_memory_primary(dir: &std::path::Path) -> (Arc<DualStore>, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let primary: Arc<dyn RecordStore> = Arc::clone(&memory) as Arc<dyn RecordStore>;
    let store = Arc::new(DualStore::new(
        Some(primary),
        FlatFileStore::new(dir).expect("open flat store"),
    ));
    (store, memory)
}

fn request(title: &str, time: &str) -> ScheduleRequest {
    ScheduleRequest {
        title: title.to_string(),
        time: time.to_string(),
        notes: "bring the brief".to_string(),
        user: UserInfo {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: "555-0100".to_string(),
            company: "Analytical Engines".to_string(),
        },
        session_user: UserInfo::default(),
        user_agent: Some("Mozilla/5.0".to_string()),
    }
}

#[tokio::test]
async fn schedule_then_list_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = flat_only(dir.path());
    let scheduler = Scheduler::new(Arc::clone(&store), dir.path().join("artifacts"));

    let outcome = scheduler
        .schedule(request("Consult", "2024-06-01T10:00:00Z"))
        .await
        .expect("schedule");
    assert_eq!(outcome.appointment.status, STATUS_SCHEDULED);
    assert!(outcome.warnings.is_empty());

    // Id format: APT-<unixSeconds>-<4 digits>.
    let parts: Vec<&str> = outcome.appointment.id.split('-').collect();
    assert_eq!(parts[0], "APT");
    assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
    assert_eq!(parts[2].len(), 4);
    assert!(parts[2].chars().all(|c| c.is_ascii_digit()));

    let listed = scheduler.list().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, outcome.appointment.id);
    assert_eq!(listed[0].title, "Consult");
}

#[tokio::test]
async fn duplicate_instant_conflicts_even_across_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let store = flat_only(dir.path());
    let scheduler = Scheduler::new(Arc::clone(&store), dir.path().join("artifacts"));

    let first = scheduler
        .schedule(request("Consult", "2024-06-01T10:00:00Z"))
        .await
        .expect("first booking");

    // Same instant written with a different UTC offset still collides.
    let err = scheduler
        .schedule(request("Other consult", "2024-06-01T12:00:00+02:00"))
        .await
        .expect_err("second booking must conflict");
    match err {
        ScheduleError::Conflict { existing } => {
            assert_eq!(existing.id, first.appointment.id);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_slot_is_reusable() {
    let dir = tempfile::tempdir().unwrap();
    let store = flat_only(dir.path());
    let scheduler = Scheduler::new(Arc::clone(&store), dir.path().join("artifacts"));

    let first = scheduler
        .schedule(request("Consult", "2024-06-01T10:00:00Z"))
        .await
        .expect("first booking");
    let cancel = scheduler.cancel(&first.appointment.id).await.expect("cancel");
    assert!(cancel.found);
    assert_eq!(cancel.appointment.status, STATUS_CANCELLED);

    // The slot is free again; cancelled rows do not block.
    let second = scheduler
        .schedule(request("Rebooked consult", "2024-06-01T10:00:00Z"))
        .await
        .expect("rebooking after cancel");
    assert_ne!(second.appointment.id, first.appointment.id);
}

#[tokio::test]
async fn missing_fields_and_bad_timestamps_are_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = flat_only(dir.path());
    let scheduler = Scheduler::new(Arc::clone(&store), dir.path().join("artifacts"));

    let err = scheduler
        .schedule(request("", "2024-06-01T10:00:00Z"))
        .await
        .expect_err("empty title");
    assert!(matches!(err, ScheduleError::Validation(_)));

    let err = scheduler
        .schedule(request("Consult", ""))
        .await
        .expect_err("empty time");
    assert!(matches!(err, ScheduleError::Validation(_)));

    let err = scheduler
        .schedule(request("Consult", "next tuesday"))
        .await
        .expect_err("unparseable time");
    assert!(matches!(err, ScheduleError::Validation(_)));
}

// The inherited contract reports cancelling an unknown id as success with a
// minimal stub instead of failing. Kept permissive on purpose; this test
// documents the smell.
#[tokio::test]
async fn cancel_unknown_id_returns_permissive_stub() {
    let dir = tempfile::tempdir().unwrap();
    let store = flat_only(dir.path());
    let scheduler = Scheduler::new(Arc::clone(&store), dir.path().join("artifacts"));

    let outcome = scheduler.cancel("APT-0-0000").await.expect("cancel");
    assert!(!outcome.found);
    assert_eq!(outcome.appointment.id, "APT-0-0000");
    assert_eq!(outcome.appointment.status, STATUS_CANCELLED);
    assert!(outcome.appointment.title.is_empty());
}

#[tokio::test]
async fn schedule_writes_through_to_primary_and_emits_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (store, memory) = with_memory_primary(dir.path());
    let artifacts = dir.path().join("artifacts");
    let scheduler = Scheduler::new(Arc::clone(&store), &artifacts);

    let outcome = scheduler
        .schedule(request("Consult", "2030-06-01T10:00:00Z"))
        .await
        .expect("schedule");

    let snapshot = memory.get_all(COLLECTION_APPOINTMENTS).await.unwrap();
    assert!(snapshot.contains_key(&outcome.appointment.id));

    let ics = artifacts.join(format!("{}.ics", outcome.appointment.id));
    assert!(ics.exists());
    let body = std::fs::read_to_string(ics).unwrap();
    assert!(body.contains("DTSTART:20300601T100000Z"));
}

#[tokio::test]
async fn cancel_with_primary_keeps_full_record() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _memory) = with_memory_primary(dir.path());
    let scheduler = Scheduler::new(Arc::clone(&store), dir.path().join("artifacts"));

    let first = scheduler
        .schedule(request("Consult", "2024-06-01T10:00:00Z"))
        .await
        .expect("schedule");
    let cancel = scheduler.cancel(&first.appointment.id).await.expect("cancel");

    // Primary details take precedence, so every field survives the flip,
    // including the company the flat-file rewrite would have dropped.
    assert!(cancel.found);
    assert_eq!(cancel.appointment.status, STATUS_CANCELLED);
    assert_eq!(cancel.appointment.title, "Consult");
    assert_eq!(cancel.appointment.notes, "bring the brief");
    assert_eq!(cancel.appointment.user.company, "Analytical Engines");

    let listed = scheduler.list().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, STATUS_CANCELLED);
}

#[tokio::test]
async fn unnamed_caller_gets_origin_label() {
    let dir = tempfile::tempdir().unwrap();
    let store = flat_only(dir.path());
    let scheduler = Scheduler::new(Arc::clone(&store), dir.path().join("artifacts"));

    let mut req = request("Consult", "2024-06-01T10:00:00Z");
    req.user = UserInfo::default();
    req.user_agent = Some("SiteBot/2.0".to_string());
    let outcome = scheduler.schedule(req).await.expect("schedule");
    assert_eq!(outcome.appointment.user.name, "Chatbot User");
}
