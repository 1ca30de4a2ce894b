//! Domain records shared across the scheduler, aggregator and gateway.
//!
//! The primary store is a schemaless document tree, so `time` and `status`
//! stay strings on the record: the dashboard must tolerate values written by
//! older clients (flat user fields, unknown status labels) and the sort order
//! is defined over the raw timestamp string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Appointment status written by the scheduler.
pub const STATUS_SCHEDULED: &str = "scheduled";
/// Appointment status written by the cancel path.
pub const STATUS_CANCELLED: &str = "cancelled";

/// Contact details attached to an appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
}

/// A scheduled (or cancelled) appointment. Never deleted; cancellation is a
/// soft status flip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// RFC 3339 instant, normalized to UTC at creation.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub user: UserInfo,
}

impl Appointment {
    /// Parsed start instant, if the stored string is a valid timestamp.
    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.time)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_CANCELLED)
    }
}

/// Parses an RFC 3339 timestamp, accepting a trailing `Z`, into UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// A captured sales lead. Written once by the lead endpoint, read-only after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: String,
    /// Unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

/// Contact details captured alongside a chat exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// One chat exchange (user message + bot reply). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub user_message: String,
    #[serde(default)]
    pub bot_response: String,
    /// Unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_details: ContactDetails,
}

/// A user captured via the chatbot contact form. Pushed to the `users`
/// collection and appended to the local JSON-lines backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    /// RFC 3339 capture time.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub source: String,
}

/// Derived per-session aggregate folded from conversations. Not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub session_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub first_seen: String,
    pub last_seen: String,
    pub conversation_count: u64,
}

/// Summary counters for the dashboard header tiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_leads: u64,
    pub leads_today: u64,
    pub total_appointments: u64,
    pub upcoming_appointments: u64,
    pub total_conversations: u64,
    pub total_users: u64,
}

/// Label/value pairs for a chart section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

/// Lead as presented on the dashboard (`created_at` rendered to RFC 3339).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub source: String,
    pub created_at: String,
}

/// Conversation as presented on the dashboard (`timestamp` rendered to RFC 3339).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: String,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: String,
    pub session_id: String,
    pub user_details: ContactDetails,
}

/// Everything the dashboard page renders. Always fully populated: a failed or
/// unconfigured store yields zeroed counters, empty lists and `error_message`,
/// never a partial view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardView {
    pub error_message: Option<String>,
    pub store_available: bool,
    pub metrics: DashboardMetrics,
    pub leads: Vec<LeadView>,
    pub appointments: Vec<Appointment>,
    pub conversations: Vec<ConversationView>,
    pub users: Vec<SessionUser>,
    pub leads_chart: ChartSeries,
    pub status_chart: ChartSeries,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_instant_accepts_zulu_and_offsets() {
        let a = parse_instant("2024-06-01T10:00:00Z").unwrap();
        let b = parse_instant("2024-06-01T12:00:00+02:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_instant_rejects_garbage() {
        assert!(parse_instant("next tuesday").is_none());
        assert!(parse_instant("").is_none());
    }

    #[test]
    fn cancelled_check_is_case_insensitive() {
        let mut appt = Appointment {
            id: "APT-1-1000".into(),
            title: "Consult".into(),
            time: "2024-06-01T10:00:00+00:00".into(),
            notes: String::new(),
            status: "Cancelled".into(),
            user: UserInfo::default(),
        };
        assert!(appt.is_cancelled());
        appt.status = STATUS_SCHEDULED.into();
        assert!(!appt.is_cancelled());
    }
}
