//! Calendar-event artifacts: one `.ics` file per scheduled appointment.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::StoreError;
use crate::types::Appointment;

/// Renders a single-event VCALENDAR for the appointment. Returns `None` when
/// the stored time string does not parse (no artifact for a broken instant).
pub fn render_event(appointment: &Appointment) -> Option<String> {
    let start = appointment.start_instant()?;
    let mut out = String::new();
    out.push_str("BEGIN:VCALENDAR\r\n");
    out.push_str("VERSION:2.0\r\n");
    out.push_str("PRODID:-//concierge//scheduler//EN\r\n");
    out.push_str("BEGIN:VEVENT\r\n");
    out.push_str(&format!("UID:{}\r\n", ics_escape(&appointment.id)));
    out.push_str(&format!("DTSTAMP:{}\r\n", Utc::now().format("%Y%m%dT%H%M%SZ")));
    out.push_str(&format!("DTSTART:{}\r\n", start.format("%Y%m%dT%H%M%SZ")));
    out.push_str(&format!("SUMMARY:{}\r\n", ics_escape(&appointment.title)));
    out.push_str(&format!("DESCRIPTION:{}\r\n", ics_escape(&appointment.notes)));
    out.push_str("END:VEVENT\r\n");
    out.push_str("END:VCALENDAR\r\n");
    Some(out)
}

/// Writes the artifact under `dir` as `{id}.ics`, creating the directory.
pub fn write_artifact(dir: &Path, appointment: &Appointment) -> Result<Option<PathBuf>, StoreError> {
    let Some(body) = render_event(appointment) else {
        return Ok(None);
    };
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.ics", appointment.id));
    fs::write(&path, body)?;
    Ok(Some(path))
}

/// Escapes text per RFC 5545: backslash, comma, semicolon, newline.
fn ics_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(';', "\\;")
        .replace('\n', "\\n")
        .replace('\r', "")
}
