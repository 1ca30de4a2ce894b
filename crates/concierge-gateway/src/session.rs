//! Cookie-correlated in-process sessions.
//!
//! The `sid` cookie carries an opaque id; profile fields and the dashboard
//! login flag live server-side in a DashMap. The id doubles as the
//! conversation session id for user deduplication.

use axum::http::HeaderMap;
use dashmap::DashMap;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";

/// Server-side state for one visitor.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub logged_in: bool,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionData>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sid: &str) -> Option<SessionData> {
        self.sessions.get(sid).map(|entry| entry.clone())
    }

    /// Replaces the profile fields, keeping the login flag.
    pub fn update_profile(&self, sid: &str, name: &str, email: &str, phone: &str, company: &str) {
        let mut entry = self.sessions.entry(sid.to_string()).or_default();
        entry.name = name.trim().to_string();
        entry.email = email.trim().to_string();
        entry.phone = phone.trim().to_string();
        entry.company = company.trim().to_string();
    }

    pub fn set_logged_in(&self, sid: &str, logged_in: bool) {
        let mut entry = self.sessions.entry(sid.to_string()).or_default();
        entry.logged_in = logged_in;
    }

    pub fn is_logged_in(&self, sid: &str) -> bool {
        self.get(sid).map(|s| s.logged_in).unwrap_or(false)
    }

    pub fn clear(&self, sid: &str) {
        self.sessions.remove(sid);
    }
}

/// Extracts the session id from the Cookie header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        let pair = pair.trim();
        if let Some(value) = pair.strip_prefix(&format!("{SESSION_COOKIE}=")) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// `Set-Cookie` value for a fresh session id.
pub fn set_cookie_value(sid: &str) -> String {
    format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn cookie_parsing_finds_sid_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; sid=abc-123; lang=en".parse().unwrap());
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert!(session_id_from_headers(&headers).is_none());
    }

    #[test]
    fn profile_update_keeps_login_flag() {
        let store = SessionStore::new();
        store.set_logged_in("s1", true);
        store.update_profile("s1", "Ada", "ada@x.com", "555", "Engines");
        let session = store.get("s1").unwrap();
        assert!(session.logged_in);
        assert_eq!(session.name, "Ada");
    }
}
