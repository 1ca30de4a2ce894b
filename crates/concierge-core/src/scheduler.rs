//! Appointment scheduling: validation, conflict detection, dual-store
//! persistence and cancellation.
//!
//! The flat-file write is the success gate; the primary-store write is
//! fire-and-forget and its failure comes back as a warning on the outcome.
//! A slot is blocked only by a non-cancelled appointment at the exact same
//! normalized instant; cancelling frees the slot for reuse.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use crate::calendar;
use crate::error::{ScheduleError, StoreError};
use crate::store::DualStore;
use crate::types::{parse_instant, Appointment, UserInfo, STATUS_CANCELLED, STATUS_SCHEDULED};

/// Inbound schedule request, after the HTTP layer has peeled the JSON.
#[derive(Debug, Default, Clone)]
pub struct ScheduleRequest {
    pub title: String,
    pub time: String,
    pub notes: String,
    /// Contact fields supplied on the request itself.
    pub user: UserInfo,
    /// Contact fields from the caller's session, used to fill unset fields.
    pub session_user: UserInfo,
    /// Raw User-Agent header, the origin signal for the synthetic label.
    pub user_agent: Option<String>,
}

/// A scheduled appointment plus any partial-write warnings.
#[derive(Debug)]
pub struct ScheduleOutcome {
    pub appointment: Appointment,
    pub warnings: Vec<String>,
}

/// Cancellation result. `found` is false when the id was unknown everywhere
/// and the appointment is the permissive stub.
#[derive(Debug)]
pub struct CancelOutcome {
    pub appointment: Appointment,
    pub found: bool,
    pub warnings: Vec<String>,
}

pub struct Scheduler {
    store: Arc<DualStore>,
    artifacts_dir: PathBuf,
}

impl Scheduler {
    pub fn new(store: Arc<DualStore>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Validates, checks the slot, assigns an id and writes through both
    /// stores. Also drops one `.ics` artifact per appointment.
    pub async fn schedule(&self, req: ScheduleRequest) -> Result<ScheduleOutcome, ScheduleError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(ScheduleError::Validation("title is required".into()));
        }
        let raw_time = req.time.trim();
        if raw_time.is_empty() {
            return Err(ScheduleError::Validation("time is required".into()));
        }
        let start = parse_instant(raw_time).ok_or_else(|| {
            ScheduleError::Validation(format!("time is not a valid timestamp: {raw_time}"))
        })?;

        // Conflict scan over the full current set. Equality is on the
        // UTC-normalized instant; cancelled rows never block a slot.
        let existing = self.store.load_appointments().await?;
        for candidate in existing {
            if candidate.is_cancelled() {
                continue;
            }
            if candidate.start_instant() == Some(start) {
                return Err(ScheduleError::Conflict {
                    existing: candidate,
                });
            }
        }

        let id = new_appointment_id();
        let user = resolve_user(&req.user, &req.session_user, req.user_agent.as_deref());
        let appointment = Appointment {
            id,
            title: title.to_string(),
            time: start.to_rfc3339(),
            notes: req.notes.trim().to_string(),
            status: STATUS_SCHEDULED.to_string(),
            user,
        };

        let outcome = self.store.write_appointment(&appointment).await?;
        let mut warnings = outcome.warnings;

        if let Err(err) = calendar::write_artifact(&self.artifacts_dir, &appointment) {
            tracing::warn!("calendar artifact for {} not written: {err}", appointment.id);
            warnings.push(format!("calendar artifact failed: {err}"));
        }

        tracing::info!("appointment scheduled: {}", appointment.id);
        Ok(ScheduleOutcome {
            appointment,
            warnings,
        })
    }

    /// Flips the status in the flat file, then independently in the primary
    /// store. Primary details take precedence in the returned record. An id
    /// found nowhere still reports success with a minimal stub, permissive
    /// by inherited contract.
    pub async fn cancel(&self, id: &str) -> Result<CancelOutcome, ScheduleError> {
        let file_row = self.store.cancel_in_files(id)?;
        let (primary_row, warnings) = self.store.cancel_in_primary(id).await;

        let found = primary_row.is_some() || file_row.is_some();
        let appointment = primary_row.or(file_row).unwrap_or_else(|| Appointment {
            id: id.to_string(),
            title: String::new(),
            time: String::new(),
            notes: String::new(),
            status: STATUS_CANCELLED.to_string(),
            user: UserInfo::default(),
        });

        tracing::info!("appointment cancelled: {id} (found: {found})");
        Ok(CancelOutcome {
            appointment,
            found,
            warnings,
        })
    }

    /// Current appointment list: primary preferred, flat file otherwise.
    pub async fn list(&self) -> Result<Vec<Appointment>, StoreError> {
        self.store.list_appointments().await
    }
}

/// `APT-<unixSeconds>-<4-digit-random>`; never reused.
fn new_appointment_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    format!("APT-{}-{}", Utc::now().timestamp(), suffix)
}

/// Request fields win, session fields fill the gaps, and an unresolvable name
/// becomes a synthetic label inferred from the request origin. The company
/// field comes from the request only.
fn resolve_user(request: &UserInfo, session: &UserInfo, user_agent: Option<&str>) -> UserInfo {
    let pick = |a: &str, b: &str| {
        let a = a.trim();
        if a.is_empty() { b.trim().to_string() } else { a.to_string() }
    };
    let mut user = UserInfo {
        name: pick(&request.name, &session.name),
        email: pick(&request.email, &session.email),
        phone: pick(&request.phone, &session.phone),
        company: request.company.trim().to_string(),
    };
    if user.name.is_empty() {
        user.name = synthetic_name(user_agent).to_string();
    }
    user
}

/// Origin heuristic for unnamed callers.
fn synthetic_name(user_agent: Option<&str>) -> &'static str {
    match user_agent {
        Some(ua) if ua.to_lowercase().contains("bot") => "Chatbot User",
        Some(ua) if !ua.trim().is_empty() => "Web User",
        _ => "Anonymous User",
    }
}
