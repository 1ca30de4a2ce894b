//! Gateway configuration loaded from `.env`.
//!
//! Credentials for the external bridges are read by the bridges themselves
//! (`RemoteStore::from_env`, `GenerativeBridge::from_env`,
//! `TwilioClient::from_env`, `SheetsClient::from_env`); a missing credential
//! degrades that feature to "unavailable" instead of failing startup. This
//! struct carries only what the gateway consumes directly.

use serde::{Deserialize, Serialize};

/// Gateway settings loaded from environment.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | CONCIERGE_PORT | 8000 | HTTP port for the gateway. |
/// | CONCIERGE_DATA_DIR | ./data | Flat-file fallback directory (`appointments.csv`, `users_data.json`). |
/// | CONCIERGE_ARTIFACTS_DIR | {data_dir}/appointments | One `.ics` file per appointment. |
/// | TWILIO_VOICE_WEBHOOK_URL | http://localhost:8000/voice | Webhook the provider hits when a call connects. |
/// | TWILIO_STATUS_CALLBACK_URL | http://localhost:8000/call-completed | Webhook for call-completion events. |
/// | DASHBOARD_USER / DASHBOARD_PASS | admin / change-me | Dashboard login credentials. |
/// | COMPANY_PROFILE_PATH | company_profile.json | Company facts feeding the FAQ table and prompt. |
/// | CONCIERGE_CACHE_TTL_SECS | 3600 | Response-cache time-to-live. |
/// | CONCIERGE_CACHE_CAP | 256 | Response-cache capacity (evict-oldest on overflow). |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub port: u16,
    pub data_dir: String,
    pub artifacts_dir: String,
    pub twilio_voice_webhook_url: String,
    pub twilio_status_callback_url: String,
    pub dashboard_user: String,
    pub dashboard_pass: String,
    pub company_profile_path: String,
    pub cache_ttl_secs: u64,
    pub cache_cap: usize,
}

impl GatewayConfig {
    /// Load from environment. Unset or invalid => defaults (see struct docs).
    pub fn from_env() -> Self {
        let data_dir = env_string("CONCIERGE_DATA_DIR", "./data");
        let artifacts_default = format!("{}/appointments", data_dir.trim_end_matches('/'));
        Self {
            port: env_u16("CONCIERGE_PORT", 8000),
            artifacts_dir: env_string("CONCIERGE_ARTIFACTS_DIR", &artifacts_default),
            data_dir,
            twilio_voice_webhook_url: env_string(
                "TWILIO_VOICE_WEBHOOK_URL",
                "http://localhost:8000/voice",
            ),
            twilio_status_callback_url: env_string(
                "TWILIO_STATUS_CALLBACK_URL",
                "http://localhost:8000/call-completed",
            ),
            dashboard_user: env_string("DASHBOARD_USER", "admin"),
            dashboard_pass: env_string("DASHBOARD_PASS", "change-me"),
            company_profile_path: env_string("COMPANY_PROFILE_PATH", "company_profile.json"),
            cache_ttl_secs: env_u64("CONCIERGE_CACHE_TTL_SECS", 3600),
            cache_cap: env_u64("CONCIERGE_CACHE_CAP", 256) as usize,
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_u16(name: &str, default: u16) -> u16 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}
