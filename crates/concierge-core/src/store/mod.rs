//! Record-store adapter: primary realtime document tree + flat-file fallback.
//!
//! `DualStore` is the only component that writes collections. Writes go
//! through to both sides where the contract asks for it (write-through,
//! best-effort, not a two-phase commit); reads prefer the primary and fall
//! back to the flat files. Partial-write failures come back as a structured
//! warning list on the outcome instead of being swallowed.

mod flatfile;
mod memory;
mod remote;

pub use flatfile::FlatFileStore;
pub use memory::MemoryStore;
pub use remote::RemoteStore;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StoreError;
use crate::types::{Appointment, Conversation, FormUser, Lead, STATUS_CANCELLED};

/// Collection names on the primary document tree.
pub const COLLECTION_LEADS: &str = "leads";
pub const COLLECTION_APPOINTMENTS: &str = "appointments";
pub const COLLECTION_CONVERSATIONS: &str = "conversations";
pub const COLLECTION_USERS: &str = "users";
/// Counter bumped on each form-captured user.
pub const COUNTER_TOTAL_USERS: &str = "metrics/total_users";

/// Schemaless keyed-document operations over one logical collection tree.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Full snapshot of a collection, keyed by record id. Empty when absent.
    async fn get_all(&self, collection: &str) -> Result<HashMap<String, Value>, StoreError>;

    /// Single record by id, `None` when absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Create or replace a record at a known id.
    async fn put(&self, collection: &str, id: &str, value: &Value) -> Result<(), StoreError>;

    /// Merge fields into an existing record.
    async fn patch(&self, collection: &str, id: &str, value: &Value) -> Result<(), StoreError>;

    /// Append under a store-generated key; returns the key.
    async fn push(&self, collection: &str, value: &Value) -> Result<String, StoreError>;

    /// Bump an integer counter node, returning the new value.
    async fn increment_counter(&self, path: &str) -> Result<i64, StoreError>;
}

/// Result of a write that targets both sides of the dual store. `warnings`
/// carries the primary-side failure when the flat-file side succeeded.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub warnings: Vec<String>,
}

/// Write-through composition of the optional primary store and the local
/// flat-file fallback. Read precedence: primary wins when both are present.
pub struct DualStore {
    primary: Option<Arc<dyn RecordStore>>,
    files: FlatFileStore,
}

impl DualStore {
    pub fn new(primary: Option<Arc<dyn RecordStore>>, files: FlatFileStore) -> Self {
        Self { primary, files }
    }

    pub fn primary(&self) -> Option<&Arc<dyn RecordStore>> {
        self.primary.as_ref()
    }

    pub fn files(&self) -> &FlatFileStore {
        &self.files
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Full appointment set for conflict scans: primary snapshot, falling
    /// back to the flat file when the primary is absent or errors.
    pub async fn load_appointments(&self) -> Result<Vec<Appointment>, StoreError> {
        if let Some(primary) = &self.primary {
            match primary.get_all(COLLECTION_APPOINTMENTS).await {
                Ok(snapshot) => {
                    return Ok(snapshot
                        .iter()
                        .map(|(key, value)| Appointment::from_value(key, value))
                        .collect());
                }
                Err(err) => {
                    tracing::warn!("primary appointment read failed, using flat file: {err}");
                }
            }
        }
        self.files.read_appointments()
    }

    /// Appends the appointment to the flat file (the success gate), then
    /// writes it through to the primary store best-effort.
    pub async fn write_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<WriteOutcome, StoreError> {
        self.files.append_appointment(appointment)?;

        let mut outcome = WriteOutcome::default();
        if let Some(primary) = &self.primary {
            let value = serde_json::to_value(appointment)?;
            if let Err(err) = primary
                .put(COLLECTION_APPOINTMENTS, &appointment.id, &value)
                .await
            {
                tracing::warn!("appointment {} not written to primary: {err}", appointment.id);
                outcome
                    .warnings
                    .push(format!("primary store write failed: {err}"));
            }
        }
        Ok(outcome)
    }

    /// Flips the status in the flat file (whole-file rewrite under the
    /// collection lock). Returns the mutated row when the id was present.
    pub fn cancel_in_files(&self, id: &str) -> Result<Option<Appointment>, StoreError> {
        self.files.cancel_appointment(id)
    }

    /// Reads the record from the primary, patches `status = cancelled`, and
    /// returns the mutated record. Primary-side failures become warnings.
    pub async fn cancel_in_primary(&self, id: &str) -> (Option<Appointment>, Vec<String>) {
        let mut warnings = Vec::new();
        let Some(primary) = &self.primary else {
            return (None, warnings);
        };
        let current = match primary.get(COLLECTION_APPOINTMENTS, id).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("primary read for cancel of {id} failed: {err}");
                warnings.push(format!("primary store read failed: {err}"));
                return (None, warnings);
            }
        };
        let Some(value) = current else {
            return (None, warnings);
        };
        let mut appointment = Appointment::from_value(id, &value);
        appointment.status = STATUS_CANCELLED.to_string();
        let patch = serde_json::json!({ "status": STATUS_CANCELLED });
        if let Err(err) = primary.patch(COLLECTION_APPOINTMENTS, id, &patch).await {
            tracing::warn!("primary status update for {id} failed: {err}");
            warnings.push(format!("primary store update failed: {err}"));
        }
        (Some(appointment), warnings)
    }

    /// Listing for the appointments endpoint: primary preferred, flat file
    /// otherwise.
    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, StoreError> {
        self.load_appointments().await
    }

    /// Persists one chat exchange. Primary-only, like the collection itself.
    pub async fn record_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let Some(primary) = &self.primary else {
            return Err(StoreError::Unavailable(
                "conversation store not configured".into(),
            ));
        };
        let value = serde_json::to_value(conversation)?;
        primary
            .put(COLLECTION_CONVERSATIONS, &conversation.id, &value)
            .await
    }

    /// Persists a captured lead. Leads live only on the primary store.
    pub async fn create_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        let Some(primary) = &self.primary else {
            return Err(StoreError::Unavailable("lead store not configured".into()));
        };
        let value = serde_json::to_value(lead)?;
        primary.put(COLLECTION_LEADS, &lead.id, &value).await
    }

    /// Pushes a form-captured user to the primary (plus the counter bump) and
    /// always appends the local JSON-lines backup.
    pub async fn store_form_user(&self, user: &FormUser) -> Result<WriteOutcome, StoreError> {
        let mut outcome = WriteOutcome::default();

        if let Some(primary) = &self.primary {
            match serde_json::to_value(user) {
                Ok(value) => match primary.push(COLLECTION_USERS, &value).await {
                    Ok(key) => {
                        tracing::info!("form user stored under users/{key}");
                        if let Err(err) = primary.increment_counter(COUNTER_TOTAL_USERS).await {
                            tracing::warn!("total_users counter bump failed: {err}");
                            outcome.warnings.push(format!("counter bump failed: {err}"));
                        }
                    }
                    Err(err) => {
                        tracing::warn!("form user not written to primary: {err}");
                        outcome
                            .warnings
                            .push(format!("primary store write failed: {err}"));
                    }
                },
                Err(err) => outcome.warnings.push(format!("serialize failed: {err}")),
            }
        }

        self.files.append_user(user)?;
        Ok(outcome)
    }

    /// Users for the dashboard/listing: primary collection first, local
    /// JSON-lines backup when the collection is empty or unreadable.
    pub async fn load_users(&self) -> Vec<FormUser> {
        if let Some(primary) = &self.primary {
            match primary.get_all(COLLECTION_USERS).await {
                Ok(snapshot) if !snapshot.is_empty() => {
                    return snapshot
                        .into_iter()
                        .filter_map(|(_, value)| serde_json::from_value(value).ok())
                        .collect();
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("primary users read failed, using local backup: {err}");
                }
            }
        }
        self.files.read_users()
    }
}

impl Appointment {
    /// Lenient decode of a schemaless appointment document. Records written
    /// by older clients carry flat `user_*` fields instead of the `user`
    /// sub-object; those are reconstructed here.
    pub fn from_value(key: &str, value: &Value) -> Self {
        let user = match value.get("user") {
            Some(u) if u.is_object() => serde_json::from_value(u.clone()).unwrap_or_default(),
            _ => crate::types::UserInfo {
                name: str_field(value, "user_name"),
                email: str_field(value, "user_email"),
                phone: str_field(value, "user_phone"),
                company: str_field(value, "user_company"),
            },
        };
        let id = match str_field(value, "id") {
            s if s.is_empty() => key.to_string(),
            s => s,
        };
        Self {
            id,
            title: str_field(value, "title"),
            time: str_field(value, "time"),
            notes: str_field(value, "notes"),
            status: str_field(value, "status"),
            user,
        }
    }
}

fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserInfo;

    #[test]
    fn from_value_prefers_user_object() {
        let value = serde_json::json!({
            "id": "APT-1-1234",
            "title": "Consult",
            "time": "2024-06-01T10:00:00+00:00",
            "status": "scheduled",
            "user": { "name": "Ada", "email": "ada@x.com" },
            "user_name": "stale flat field"
        });
        let appt = Appointment::from_value("key", &value);
        assert_eq!(appt.user.name, "Ada");
        assert_eq!(appt.id, "APT-1-1234");
    }

    #[test]
    fn from_value_reconstructs_legacy_flat_fields() {
        let value = serde_json::json!({
            "title": "Legacy",
            "user_name": "Bob",
            "user_email": "bob@x.com",
            "user_phone": "555",
            "user_company": "Acme"
        });
        let appt = Appointment::from_value("legacy-key", &value);
        assert_eq!(appt.id, "legacy-key");
        assert_eq!(
            appt.user,
            UserInfo {
                name: "Bob".into(),
                email: "bob@x.com".into(),
                phone: "555".into(),
                company: "Acme".into(),
            }
        );
    }
}
