//! Dashboard aggregation tests: zeroed empty views, the union-dedup user
//! total, upcoming/status derivations, sorting, and the 7-day chart shape.
//!
//! Run with: `cargo test --test dashboard_metrics_test`

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use concierge_core::{
    DashboardAggregator, DualStore, FlatFileStore, FormUser, MemoryStore, RecordStore,
    COLLECTION_APPOINTMENTS, COLLECTION_CONVERSATIONS, COLLECTION_LEADS, COLLECTION_USERS,
};

fn with_memory_primary(dir: &std::path::Path) -> (Arc<DualStore>, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let primary: Arc<dyn RecordStore> = Arc::clone(&memory) as Arc<dyn RecordStore>;
    let store = Arc::new(DualStore::new(
        Some(primary),
        FlatFileStore::new(dir).expect("open flat store"),
    ));
    (store, memory)
}

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 7, 12, 0, 0).unwrap()
}

fn ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .unwrap()
        .timestamp_millis()
}

#[tokio::test]
async fn empty_store_yields_all_zero_view() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _memory) = with_memory_primary(dir.path());
    let view = DashboardAggregator::new(store).compute_at(fixed_now()).await;

    assert!(view.store_available);
    assert!(view.error_message.is_none());
    assert_eq!(view.metrics.total_leads, 0);
    assert_eq!(view.metrics.leads_today, 0);
    assert_eq!(view.metrics.total_appointments, 0);
    assert_eq!(view.metrics.upcoming_appointments, 0);
    assert_eq!(view.metrics.total_conversations, 0);
    assert_eq!(view.metrics.total_users, 0);
    assert!(view.leads.is_empty());
    assert!(view.appointments.is_empty());
    assert!(view.conversations.is_empty());
    assert!(view.users.is_empty());
    assert_eq!(view.leads_chart.labels.len(), 7);
    assert_eq!(view.leads_chart.values, vec![0; 7]);
}

#[tokio::test]
async fn unconfigured_store_flags_unavailable_with_zeroed_counters() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DualStore::new(None, FlatFileStore::new(dir.path()).unwrap()));
    let view = DashboardAggregator::new(store).compute_at(fixed_now()).await;

    assert!(!view.store_available);
    assert!(view.error_message.is_some());
    assert_eq!(view.metrics.total_users, 0);
    assert_eq!(view.leads_chart.labels.len(), 7);
    assert_eq!(view.leads_chart.values, vec![0; 7]);
}

// Sessions yield keys {a@x.com, b@x.com}, form users yield {b@x.com,
// c@x.com}; the union, not either source alone, is the total: 3.
#[tokio::test]
async fn total_users_is_the_union_of_identity_keys() {
    let dir = tempfile::tempdir().unwrap();
    let (store, memory) = with_memory_primary(dir.path());

    let conversations = [
        ("c1", "s1", "a@x.com"),
        ("c2", "s1", "a@x.com"),
        ("c3", "s2", "b@x.com"),
    ];
    for (id, session, email) in conversations {
        memory
            .put(
                COLLECTION_CONVERSATIONS,
                id,
                &json!({
                    "id": id,
                    "user_message": "hi",
                    "bot_response": "hello",
                    "timestamp": ms(2024, 6, 6, 10),
                    "session_id": session,
                    "user_details": { "name": "", "email": email, "phone": "" },
                }),
            )
            .await
            .unwrap();
    }
    for (key, email) in [("u1", "b@x.com"), ("u2", "c@x.com")] {
        memory
            .put(
                COLLECTION_USERS,
                key,
                &json!({ "name": "", "email": email, "phone": "", "source": "chatbot_form" }),
            )
            .await
            .unwrap();
    }

    let view = DashboardAggregator::new(store).compute_at(fixed_now()).await;
    assert_eq!(view.metrics.total_users, 3);
    assert_eq!(view.metrics.total_conversations, 3);
    assert_eq!(view.users.len(), 2); // two sessions
}

#[tokio::test]
async fn users_collection_falls_back_to_local_backup_when_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _memory) = with_memory_primary(dir.path());
    store
        .files()
        .append_user(&FormUser {
            name: "Backup Bea".into(),
            email: "bea@x.com".into(),
            phone: String::new(),
            company: String::new(),
            timestamp: "2024-06-06T10:00:00+00:00".into(),
            source: "chatbot_form".into(),
        })
        .unwrap();

    let view = DashboardAggregator::new(store).compute_at(fixed_now()).await;
    assert_eq!(view.metrics.total_users, 1);
}

#[tokio::test]
async fn leads_bucket_by_utc_day_and_fill_the_chart() {
    let dir = tempfile::tempdir().unwrap();
    let (store, memory) = with_memory_primary(dir.path());

    let leads = [
        ("l1", ms(2024, 6, 7, 9)),  // today
        ("l2", ms(2024, 6, 7, 11)), // today
        ("l3", ms(2024, 6, 5, 9)),  // two days back
        ("l4", ms(2024, 5, 20, 9)), // outside the 7-day window
    ];
    for (id, created) in leads {
        memory
            .put(
                COLLECTION_LEADS,
                id,
                &json!({
                    "id": id,
                    "name": "Lead",
                    "email": format!("{id}@x.com"),
                    "phone": "",
                    "message": "call me",
                    "source": "chatbot",
                    "created_at": created,
                }),
            )
            .await
            .unwrap();
    }

    let view = DashboardAggregator::new(store).compute_at(fixed_now()).await;
    assert_eq!(view.metrics.total_leads, 4);
    assert_eq!(view.metrics.leads_today, 2);
    assert_eq!(view.leads_chart.labels.len(), 7);
    // Window is Jun 1..Jun 7, oldest first: Jun 5 has one, Jun 7 has two.
    assert_eq!(view.leads_chart.values, vec![0, 0, 0, 0, 1, 0, 2]);
    // Sorted newest first.
    assert_eq!(view.leads[0].id, "l2");
}

#[tokio::test]
async fn appointment_section_derives_upcoming_and_status_histogram() {
    let dir = tempfile::tempdir().unwrap();
    let (store, memory) = with_memory_primary(dir.path());

    let rows = [
        ("a1", "2024-06-08T10:00:00+00:00", "scheduled"), // future
        ("a2", "2024-06-09T10:00:00+00:00", "cancelled"), // future but cancelled
        ("a3", "2024-06-01T10:00:00+00:00", "scheduled"), // past
    ];
    for (id, time, status) in rows {
        memory
            .put(
                COLLECTION_APPOINTMENTS,
                id,
                &json!({
                    "id": id,
                    "title": "Consult",
                    "time": time,
                    "notes": "",
                    "status": status,
                    "user": { "name": "Ada", "email": "", "phone": "", "company": "" },
                }),
            )
            .await
            .unwrap();
    }
    // Legacy record: no user object, no status, flat fields only.
    memory
        .put(
            COLLECTION_APPOINTMENTS,
            "a4",
            &json!({ "title": "Old record", "time": "", "user_name": "" }),
        )
        .await
        .unwrap();

    let view = DashboardAggregator::new(store).compute_at(fixed_now()).await;
    assert_eq!(view.metrics.total_appointments, 4);
    assert_eq!(view.metrics.upcoming_appointments, 1);

    let histogram: std::collections::HashMap<_, _> = view
        .status_chart
        .labels
        .iter()
        .cloned()
        .zip(view.status_chart.values.iter().copied())
        .collect();
    assert_eq!(histogram.get("scheduled"), Some(&2));
    assert_eq!(histogram.get("cancelled"), Some(&1));
    assert_eq!(histogram.get("pending"), Some(&1));

    // Legacy record degraded gracefully and sank to the bottom of the sort
    // (missing time sorts as the empty string).
    let last = view.appointments.last().unwrap();
    assert_eq!(last.title, "Old record");
    assert_eq!(last.user.name, "Anonymous User");
}

#[tokio::test]
async fn session_fold_tracks_first_last_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let (store, memory) = with_memory_primary(dir.path());

    let times = [
        ("c1", ms(2024, 6, 5, 9)),
        ("c2", ms(2024, 6, 6, 9)),
        ("c3", ms(2024, 6, 4, 9)),
    ];
    for (id, at) in times {
        memory
            .put(
                COLLECTION_CONVERSATIONS,
                id,
                &json!({
                    "id": id,
                    "user_message": "hi",
                    "bot_response": "hello",
                    "timestamp": at,
                    "session_id": "s1",
                    "user_details": { "name": "Ada", "email": "ada@x.com", "phone": "" },
                }),
            )
            .await
            .unwrap();
    }

    let view = DashboardAggregator::new(store).compute_at(fixed_now()).await;
    assert_eq!(view.users.len(), 1);
    let user = &view.users[0];
    assert_eq!(user.conversation_count, 3);
    assert!(user.first_seen.starts_with("2024-06-04"));
    assert!(user.last_seen.starts_with("2024-06-06"));
    // Conversations sorted newest first.
    assert_eq!(view.conversations[0].id, "c2");
}
