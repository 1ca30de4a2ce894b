//! Flat-file fallback store: `appointments.csv` + `users_data.json`.
//!
//! The CSV has no update-in-place: cancellation rewrites the whole file. A
//! per-file mutex serializes every read-modify-write cycle, so concurrent
//! schedule/cancel calls cannot lose rows to a last-writer-wins rewrite.
//!
//! The create path writes nine columns including `user_company`; the cancel
//! rewrite writes eight, dropping that column. The two field sets diverge in
//! the upstream data and are kept divergent here on purpose: rows that went
//! through a cancel cycle lose the company value.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::types::{Appointment, FormUser, UserInfo, STATUS_CANCELLED};

const APPOINTMENTS_FILE: &str = "appointments.csv";
const USERS_FILE: &str = "users_data.json";

/// Column set written when a new appointment is appended.
const CREATE_FIELDS: [&str; 9] = [
    "id",
    "title",
    "time",
    "notes",
    "status",
    "user_name",
    "user_email",
    "user_phone",
    "user_company",
];

/// Column set written by the cancel-path rewrite. `user_company` is absent.
const CANCEL_FIELDS: [&str; 8] = [
    "id",
    "title",
    "time",
    "notes",
    "status",
    "user_name",
    "user_email",
    "user_phone",
];

/// Local durability backstop used when the primary store is absent.
pub struct FlatFileStore {
    dir: PathBuf,
    appointments_lock: Mutex<()>,
    users_lock: Mutex<()>,
}

impl FlatFileStore {
    /// Uses (and creates) `dir` for both flat files.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            appointments_lock: Mutex::new(()),
            users_lock: Mutex::new(()),
        })
    }

    fn appointments_path(&self) -> PathBuf {
        self.dir.join(APPOINTMENTS_FILE)
    }

    fn users_path(&self) -> PathBuf {
        self.dir.join(USERS_FILE)
    }

    /// All appointment rows. A missing file is an empty set, not an error.
    pub fn read_appointments(&self) -> Result<Vec<Appointment>, StoreError> {
        let _guard = self.appointments_lock.lock().expect("appointments lock");
        self.read_appointments_unlocked()
    }

    fn read_appointments_unlocked(&self) -> Result<Vec<Appointment>, StoreError> {
        let content = match fs::read_to_string(self.appointments_path()) {
            Ok(c) => c,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut records = parse_csv(&content).into_iter();
        let Some(header) = records.next() else {
            return Ok(Vec::new());
        };
        Ok(records
            .map(|fields| row_to_appointment(&header, &fields))
            .collect())
    }

    /// Appends one row, writing the create-path header when the file is new.
    pub fn append_appointment(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let _guard = self.appointments_lock.lock().expect("appointments lock");
        let path = self.appointments_path();
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(file, "{}", CREATE_FIELDS.join(","))?;
        }
        let row = [
            appointment.id.as_str(),
            appointment.title.as_str(),
            appointment.time.as_str(),
            appointment.notes.as_str(),
            appointment.status.as_str(),
            appointment.user.name.as_str(),
            appointment.user.email.as_str(),
            appointment.user.phone.as_str(),
            appointment.user.company.as_str(),
        ];
        writeln!(file, "{}", encode_csv_row(&row))?;
        Ok(())
    }

    /// Read-modify-write cycle for cancellation, all under the file lock:
    /// flips the status of the matching row and rewrites the whole file with
    /// the cancel-path column set. Returns the mutated row when found; leaves
    /// the file untouched when it has no rows.
    pub fn cancel_appointment(&self, id: &str) -> Result<Option<Appointment>, StoreError> {
        let _guard = self.appointments_lock.lock().expect("appointments lock");
        let mut rows = self.read_appointments_unlocked()?;
        let mut cancelled: Option<Appointment> = None;
        for row in rows.iter_mut() {
            if row.id == id {
                row.status = STATUS_CANCELLED.to_string();
                cancelled = Some(row.clone());
                break;
            }
        }
        if !rows.is_empty() {
            let mut out = String::new();
            out.push_str(&CANCEL_FIELDS.join(","));
            out.push('\n');
            for row in &rows {
                let fields = [
                    row.id.as_str(),
                    row.title.as_str(),
                    row.time.as_str(),
                    row.notes.as_str(),
                    row.status.as_str(),
                    row.user.name.as_str(),
                    row.user.email.as_str(),
                    row.user.phone.as_str(),
                ];
                out.push_str(&encode_csv_row(&fields));
                out.push('\n');
            }
            fs::write(self.appointments_path(), out)?;
        }
        Ok(cancelled)
    }

    /// Appends one JSON object per line. Append-only.
    pub fn append_user(&self, user: &FormUser) -> Result<(), StoreError> {
        let _guard = self.users_lock.lock().expect("users lock");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.users_path())?;
        writeln!(file, "{}", serde_json::to_string(user)?)?;
        Ok(())
    }

    /// All captured users from the JSON-lines backup. Malformed lines are
    /// skipped with a warning; a missing file is an empty set.
    pub fn read_users(&self) -> Vec<FormUser> {
        let _guard = self.users_lock.lock().expect("users lock");
        let file = match File::open(self.users_path()) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };
        let mut users = Vec::new();
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FormUser>(trimmed) {
                Ok(user) => users.push(user),
                Err(err) => tracing::warn!("skipping malformed user line: {err}"),
            }
        }
        users
    }
}

fn row_to_appointment(header: &[String], fields: &[String]) -> Appointment {
    let get = |name: &str| -> String {
        header
            .iter()
            .position(|h| h == name)
            .and_then(|idx| fields.get(idx))
            .cloned()
            .unwrap_or_default()
    };
    Appointment {
        id: get("id"),
        title: get("title"),
        time: get("time"),
        notes: get("notes"),
        status: get("status"),
        user: UserInfo {
            name: get("user_name"),
            email: get("user_email"),
            phone: get("user_phone"),
            company: get("user_company"),
        },
    }
}

fn encode_csv_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Minimal RFC 4180 quoting: fields containing a comma, quote or newline are
/// wrapped in quotes with inner quotes doubled.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parses full CSV content into records, honoring the quoting produced by
/// [`csv_escape`], including newlines inside quoted fields.
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
                if !(fields.len() == 1 && fields[0].trim().is_empty()) {
                    records.push(std::mem::take(&mut fields));
                }
                fields.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        if !(fields.len() == 1 && fields[0].trim().is_empty()) {
            records.push(fields);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::STATUS_SCHEDULED;

    fn sample(id: &str, notes: &str) -> Appointment {
        Appointment {
            id: id.to_string(),
            title: "Consult".into(),
            time: "2024-06-01T10:00:00+00:00".into(),
            notes: notes.to_string(),
            status: STATUS_SCHEDULED.into(),
            user: UserInfo {
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                phone: "+1 555 0100".into(),
                company: "Analytical Engines".into(),
            },
        }
    }

    #[test]
    fn csv_quoting_round_trips() {
        let line = encode_csv_row(&["plain", "has,comma", "has \"quote\"", "multi\nline"]);
        let records = parse_csv(&line);
        assert_eq!(records.len(), 1);
        let fields = &records[0];
        assert_eq!(fields[0], "plain");
        assert_eq!(fields[1], "has,comma");
        assert_eq!(fields[2], "has \"quote\"");
        assert_eq!(fields[3], "multi\nline");
    }

    #[test]
    fn multiline_notes_survive_the_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).unwrap();
        let appt = sample("APT-1-1000", "line one\nline two");
        store.append_appointment(&appt).unwrap();
        let rows = store.read_appointments().unwrap();
        assert_eq!(rows[0].notes, "line one\nline two");
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).unwrap();
        assert!(store.read_appointments().unwrap().is_empty());
        assert!(store.read_users().is_empty());
    }

    #[test]
    fn append_then_read_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).unwrap();
        let appt = sample("APT-1700000000-1234", "bring the contract, please");
        store.append_appointment(&appt).unwrap();

        let rows = store.read_appointments().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, appt.id);
        assert_eq!(rows[0].notes, appt.notes);
        assert_eq!(rows[0].user.company, "Analytical Engines");
    }

    #[test]
    fn cancel_flips_status_and_keeps_other_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).unwrap();
        store.append_appointment(&sample("APT-1-1000", "first")).unwrap();
        store.append_appointment(&sample("APT-2-2000", "second")).unwrap();

        let cancelled = store.cancel_appointment("APT-1-1000").unwrap().unwrap();
        assert_eq!(cancelled.status, STATUS_CANCELLED);

        let rows = store.read_appointments().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, STATUS_CANCELLED);
        assert_eq!(rows[1].status, STATUS_SCHEDULED);
    }

    // Design smell inherited from the upstream data format: the cancel-path
    // rewrite drops the user_company column for every row in the file. Pinned
    // here so it cannot be unified silently.
    #[test]
    fn cancel_rewrite_drops_company_column() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).unwrap();
        store.append_appointment(&sample("APT-1-1000", "first")).unwrap();
        store.cancel_appointment("APT-1-1000").unwrap();

        let header = std::fs::read_to_string(dir.path().join("appointments.csv")).unwrap();
        let header_line = header.lines().next().unwrap();
        assert!(!header_line.contains("user_company"));

        let rows = store.read_appointments().unwrap();
        assert_eq!(rows[0].user.company, "");
    }

    #[test]
    fn cancel_unknown_id_returns_none_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).unwrap();
        store.append_appointment(&sample("APT-1-1000", "first")).unwrap();

        assert!(store.cancel_appointment("APT-9-9999").unwrap().is_none());
        let rows = store.read_appointments().unwrap();
        assert_eq!(rows[0].status, STATUS_SCHEDULED);
    }

    #[test]
    fn users_jsonl_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path()).unwrap();
        let user = FormUser {
            name: "Bob".into(),
            email: "bob@example.com".into(),
            phone: String::new(),
            company: "Acme".into(),
            timestamp: "2024-06-01T10:00:00+00:00".into(),
            source: "chatbot_form".into(),
        };
        store.append_user(&user).unwrap();
        store.append_user(&user).unwrap();

        let users = store.read_users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "bob@example.com");
    }
}
