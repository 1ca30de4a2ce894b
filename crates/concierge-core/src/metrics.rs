//! Dashboard aggregation: summary counters, chart series and the
//! deduplicated user total.
//!
//! Read-only over the store. Every section degrades independently: one
//! collection failing to load leaves the others intact, and the caller always
//! receives a fully-populated view: zeroed counters and empty lists at
//! worst, never an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde_json::Value;

use crate::identity::IdentityResolver;
use crate::store::{
    DualStore, COLLECTION_APPOINTMENTS, COLLECTION_CONVERSATIONS, COLLECTION_LEADS,
    COLLECTION_USERS,
};
use crate::types::{
    Appointment, ChartSeries, ContactDetails, ConversationView, DashboardView, LeadView,
    SessionUser,
};

const ANONYMOUS_NAME: &str = "Anonymous User";
const DEFAULT_SESSION: &str = "default";

pub struct DashboardAggregator {
    store: Arc<DualStore>,
    identity: IdentityResolver,
}

impl DashboardAggregator {
    pub fn new(store: Arc<DualStore>) -> Self {
        Self {
            store,
            identity: IdentityResolver::default(),
        }
    }

    pub fn with_identity(store: Arc<DualStore>, identity: IdentityResolver) -> Self {
        Self { store, identity }
    }

    /// Best-effort dashboard view at the current instant.
    pub async fn compute(&self) -> DashboardView {
        self.compute_at(Utc::now()).await
    }

    /// Same, with an injected clock for deterministic tests.
    pub async fn compute_at(&self, now: DateTime<Utc>) -> DashboardView {
        let mut view = DashboardView {
            leads_chart: chart_series(&HashMap::new(), now.date_naive()),
            ..DashboardView::default()
        };

        let Some(primary) = self.store.primary() else {
            view.error_message = Some(
                "Record store is not configured on the server. Provide credentials and restart."
                    .to_string(),
            );
            return view;
        };
        view.store_available = true;

        let mut failed_sections = 0usize;
        let mut read = |name: &'static str, result: Result<HashMap<String, Value>, _>| match result
        {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!("dashboard read of {name} failed: {err}");
                failed_sections += 1;
                HashMap::new()
            }
        };

        let leads_snapshot = read(COLLECTION_LEADS, primary.get_all(COLLECTION_LEADS).await);
        let appts_snapshot = read(
            COLLECTION_APPOINTMENTS,
            primary.get_all(COLLECTION_APPOINTMENTS).await,
        );
        let convs_snapshot = read(
            COLLECTION_CONVERSATIONS,
            primary.get_all(COLLECTION_CONVERSATIONS).await,
        );
        let users_snapshot = read(COLLECTION_USERS, primary.get_all(COLLECTION_USERS).await);

        if failed_sections == 4 {
            view.store_available = false;
            view.error_message = Some("Record store is unreachable.".to_string());
            return view;
        }

        // Leads: views + UTC calendar-day buckets.
        let mut day_counts: HashMap<String, u64> = HashMap::new();
        for (key, value) in &leads_snapshot {
            let created_ms = value.get("created_at").and_then(Value::as_i64).unwrap_or(0);
            let created_at = match DateTime::<Utc>::from_timestamp_millis(created_ms) {
                Some(dt) => {
                    *day_counts
                        .entry(dt.date_naive().format("%Y-%m-%d").to_string())
                        .or_insert(0) += 1;
                    dt.to_rfc3339()
                }
                None => created_ms.to_string(),
            };
            view.leads.push(LeadView {
                id: non_empty_or(str_field(value, "id"), key),
                name: str_field(value, "name"),
                email: str_field(value, "email"),
                phone: str_field(value, "phone"),
                message: str_field(value, "message"),
                source: str_field(value, "source"),
                created_at,
            });
        }

        // Appointments: status histogram + upcoming count.
        let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
        for (key, value) in &appts_snapshot {
            let mut appointment = Appointment::from_value(key, value);
            appointment.status = normalize_status(&appointment.status);
            if appointment.user.name.trim().is_empty() || appointment.user.name == "Anonymous" {
                appointment.user.name = ANONYMOUS_NAME.to_string();
            }
            *status_counts.entry(appointment.status.clone()).or_insert(0) += 1;
            if !appointment.is_cancelled() {
                if let Some(start) = appointment.start_instant() {
                    if start > now {
                        view.metrics.upcoming_appointments += 1;
                    }
                }
            }
            view.appointments.push(appointment);
        }

        // Conversations: views + session fold (first/last seen are min/max of
        // the session's timestamps; details come from the earliest record).
        struct SessionFold {
            user: SessionUser,
            first_ms: i64,
            last_ms: i64,
        }
        let mut sessions: HashMap<String, SessionFold> = HashMap::new();
        for (key, value) in &convs_snapshot {
            let timestamp_ms = value.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
            let timestamp = render_ms(timestamp_ms);
            let details: ContactDetails = value
                .get("user_details")
                .cloned()
                .and_then(|d| serde_json::from_value(d).ok())
                .unwrap_or_default();
            let session_id = non_empty_or(str_field(value, "session_id"), DEFAULT_SESSION);

            view.conversations.push(ConversationView {
                id: non_empty_or(str_field(value, "id"), key),
                user_message: str_field(value, "user_message"),
                bot_response: str_field(value, "bot_response"),
                timestamp: timestamp.clone(),
                session_id: session_id.clone(),
                user_details: details.clone(),
            });

            match sessions.get_mut(&session_id) {
                None => {
                    sessions.insert(
                        session_id.clone(),
                        SessionFold {
                            user: SessionUser {
                                session_id,
                                name: details.name,
                                email: details.email,
                                phone: details.phone,
                                first_seen: timestamp.clone(),
                                last_seen: timestamp,
                                conversation_count: 1,
                            },
                            first_ms: timestamp_ms,
                            last_ms: timestamp_ms,
                        },
                    );
                }
                Some(fold) => {
                    fold.user.conversation_count += 1;
                    if timestamp_ms < fold.first_ms {
                        fold.first_ms = timestamp_ms;
                        fold.user.first_seen = timestamp.clone();
                        fold.user.name = details.name;
                        fold.user.email = details.email;
                        fold.user.phone = details.phone;
                    }
                    if timestamp_ms > fold.last_ms {
                        fold.last_ms = timestamp_ms;
                        fold.user.last_seen = timestamp;
                    }
                }
            }
        }
        let mut session_users: Vec<SessionUser> =
            sessions.into_values().map(|fold| fold.user).collect();
        session_users.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));

        // Unique users: union of identity keys from session aggregates and
        // form-captured users. The union count, not either source alone, is
        // the canonical total.
        let mut unique_keys: std::collections::HashSet<String> = std::collections::HashSet::new();
        for user in &session_users {
            if let Some(key) = self.identity.key_for_session_user(user) {
                unique_keys.insert(key);
            }
        }
        let form_users = if users_snapshot.is_empty() {
            self.store.files().read_users()
        } else {
            users_snapshot
                .values()
                .filter_map(|value| serde_json::from_value(value.clone()).ok())
                .collect()
        };
        for user in &form_users {
            if let Some(key) = self.identity.key_for_form_user(user) {
                unique_keys.insert(key);
            }
        }
        view.metrics.total_users = unique_keys.len() as u64;
        if view.metrics.total_users == 0 {
            view.metrics.total_users = session_users.len() as u64;
        }
        view.users = session_users;

        // Lists sort descending by raw timestamp string; a missing key is the
        // empty string and sinks to the bottom. Stable.
        view.leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        view.appointments.sort_by(|a, b| b.time.cmp(&a.time));
        view.conversations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let today_key = now.date_naive().format("%Y-%m-%d").to_string();
        view.metrics.total_leads = view.leads.len() as u64;
        view.metrics.leads_today = day_counts.get(&today_key).copied().unwrap_or(0);
        view.metrics.total_appointments = view.appointments.len() as u64;
        view.metrics.total_conversations = view.conversations.len() as u64;

        view.leads_chart = chart_series(&day_counts, now.date_naive());
        view.status_chart = ChartSeries {
            labels: status_counts.keys().cloned().collect(),
            values: status_counts.values().copied().collect(),
        };
        view
    }
}

/// Trailing 7-day series ending today: weekday labels oldest first,
/// zero-filled. Always exactly seven entries.
fn chart_series(day_counts: &HashMap<String, u64>, today: NaiveDate) -> ChartSeries {
    let mut series = ChartSeries::default();
    for offset in (0..7).rev() {
        let day = today - Days::new(offset);
        series.labels.push(day.format("%a").to_string());
        series.values.push(
            day_counts
                .get(&day.format("%Y-%m-%d").to_string())
                .copied()
                .unwrap_or(0),
        );
    }
    series
}

fn normalize_status(status: &str) -> String {
    let status = status.trim().to_lowercase();
    if status.is_empty() {
        "pending".to_string()
    } else {
        status
    }
}

fn render_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_has_seven_entries_oldest_first_zero_filled() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(); // a Friday
        let mut counts = HashMap::new();
        counts.insert("2024-06-07".to_string(), 3u64);
        counts.insert("2024-05-31".to_string(), 9u64); // outside the window
        counts.insert("2024-06-03".to_string(), 1u64);

        let series = chart_series(&counts, today);
        assert_eq!(series.labels.len(), 7);
        assert_eq!(series.values.len(), 7);
        assert_eq!(series.labels[0], "Sat");
        assert_eq!(series.labels[6], "Fri");
        assert_eq!(series.values, vec![0, 0, 1, 0, 0, 0, 3]);
    }

    #[test]
    fn chart_on_empty_counts_is_all_zero() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let series = chart_series(&HashMap::new(), today);
        assert_eq!(series.values, vec![0; 7]);
    }

    #[test]
    fn status_normalization_defaults_and_lowercases() {
        assert_eq!(normalize_status(""), "pending");
        assert_eq!(normalize_status("  "), "pending");
        assert_eq!(normalize_status("Scheduled"), "scheduled");
        assert_eq!(normalize_status("NO-SHOW"), "no-show");
    }

    #[test]
    fn millisecond_rendering_survives_out_of_range() {
        assert_eq!(render_ms(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(render_ms(i64::MAX), i64::MAX.to_string());
    }
}
