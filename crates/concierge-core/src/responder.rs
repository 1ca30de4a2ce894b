//! Conversation responder: static FAQ table, bounded response cache,
//! generative fallback.
//!
//! Lookup order is FAQ substring match (case-insensitive, first match wins),
//! then the exact-string cache, then the generative bridge. The cache key is
//! the raw, unnormalized input: distinct casing or whitespace is a distinct
//! entry, and tests pin that hit-rate behavior. Any bridge failure yields the
//! fixed apology line.

use std::fs;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::llm::GenerativeBridge;

/// Fixed reply when the generative collaborator is missing or failing.
pub const APOLOGY: &str = "I apologize for the inconvenience, but I'm currently experiencing some technical difficulties. Please try again in a moment.";

const MAX_REPLY_LINES: usize = 6;

/// Company facts feeding the FAQ table and the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub founded: String,
    pub location: String,
    #[serde(default)]
    pub offices: Vec<String>,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub online_services: Vec<String>,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: "the company".to_string(),
            kind: "service business".to_string(),
            founded: String::new(),
            location: "our headquarters".to_string(),
            offices: Vec::new(),
            vision: "To serve our customers well.".to_string(),
            online_services: Vec::new(),
        }
    }
}

impl CompanyProfile {
    /// Loads the profile JSON; a missing or malformed file degrades to the
    /// built-in default with a warning.
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(profile) => profile,
                Err(err) => {
                    tracing::warn!("company profile {path} is malformed, using default: {err}");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("company profile {path} not readable, using default: {err}");
                Self::default()
            }
        }
    }
}

/// Exact-string reply cache with lazy TTL expiry and a hard capacity.
/// On overflow the oldest entry is evicted after expired ones are swept.
pub struct ResponseCache {
    entries: DashMap<String, (Instant, String)>,
    ttl: Duration,
    cap: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, cap: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            cap: cap.max(1),
        }
    }

    /// Cached reply for the raw input, if present and not expired.
    pub fn get(&self, input: &str) -> Option<String> {
        let expired = match self.entries.get(input) {
            Some(entry) => {
                let (at, reply) = entry.value();
                if at.elapsed() < self.ttl {
                    return Some(reply.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(input);
        }
        None
    }

    pub fn insert(&self, input: &str, reply: &str) {
        if self.entries.len() >= self.cap {
            self.evict();
        }
        self.entries
            .insert(input.to_string(), (Instant::now(), reply.to_string()));
    }

    fn evict(&self) {
        self.entries.retain(|_, (at, _)| at.elapsed() < self.ttl);
        while self.entries.len() >= self.cap {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().0)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Answers chat messages. FAQ and cache are in-process; only the generative
/// bridge leaves the machine.
pub struct ConversationResponder {
    profile: CompanyProfile,
    faq: Vec<(String, String)>,
    cache: ResponseCache,
    bridge: Option<GenerativeBridge>,
}

impl ConversationResponder {
    pub fn new(
        profile: CompanyProfile,
        cache: ResponseCache,
        bridge: Option<GenerativeBridge>,
    ) -> Self {
        let faq = build_faq(&profile);
        Self {
            profile,
            faq,
            cache,
            bridge,
        }
    }

    /// Never fails: FAQ hit, cache hit, fresh completion, or the apology.
    pub async fn respond(&self, input: &str) -> String {
        let lowered = input.to_lowercase();
        let lowered = lowered.trim();
        for (trigger, reply) in &self.faq {
            if lowered.contains(trigger.as_str()) {
                return reply.clone();
            }
        }

        if let Some(cached) = self.cache.get(input) {
            tracing::debug!("returning cached reply");
            return cached;
        }

        let Some(bridge) = &self.bridge else {
            tracing::warn!("generative bridge not configured, sending apology");
            return APOLOGY.to_string();
        };

        match bridge.generate(&self.build_prompt(input)).await {
            Ok(raw) => {
                let reply = postprocess(&raw);
                self.cache.insert(input, &reply);
                reply
            }
            Err(err) => {
                tracing::error!("generative call failed: {err}");
                APOLOGY.to_string()
            }
        }
    }

    fn build_prompt(&self, input: &str) -> String {
        let services = self
            .profile
            .online_services
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "You are a customer service rep for {name}.\n\
             Answer this question briefly (max {lines} lines): {input}\n\n\
             Company Info:\n\
             - Type: {kind}\n\
             - Founded: {founded}\n\
             - Location: {location}\n\n\
             Services: {services} and more.\n\n\
             Be brief, helpful, and professional. Do not include contact \
             information or website details in your response. If the question \
             is unrelated to {name}, politely redirect to our services.",
            name = self.profile.name,
            lines = MAX_REPLY_LINES,
            input = input,
            kind = self.profile.kind,
            founded = self.profile.founded,
            location = self.profile.location,
            services = services,
        )
    }
}

/// Profile-driven FAQ table. Triggers are lowercase substrings; order matters
/// (first match wins, no ranking).
fn build_faq(profile: &CompanyProfile) -> Vec<(String, String)> {
    let services_reply = if profile.online_services.is_empty() {
        format!(
            "We offer a range of services. Would you like to get in touch with the {} team for details?",
            profile.name
        )
    } else {
        format!(
            "We offer a wide range of services including {}. Would you like specific details about any of these?",
            profile.online_services.join(", ")
        )
    };
    let location_reply = if profile.offices.is_empty() {
        format!("We are headquartered in {}.", profile.location)
    } else {
        format!(
            "We are headquartered in {} with offices in {}.",
            profile.location,
            profile.offices.join(", ")
        )
    };
    vec![
        ("what are your services".to_string(), services_reply),
        ("where are you located".to_string(), location_reply),
        (
            "how can i contact you".to_string(),
            "I'd be happy to help you get in touch with our team. Please let me know what \
             specific information or assistance you need, and I can guide you to the right \
             department or provide relevant details."
                .to_string(),
        ),
        ("what is your vision".to_string(), profile.vision.clone()),
    ]
}

/// Strips emphasis markup and bounds the reply to its first lines.
fn postprocess(raw: &str) -> String {
    let stripped = raw.trim().replace('*', "");
    stripped
        .lines()
        .take(MAX_REPLY_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CompanyProfile {
        CompanyProfile {
            name: "Harborview Media".into(),
            kind: "marketing agency".into(),
            founded: "2012".into(),
            location: "Lisbon".into(),
            offices: vec!["Porto".into(), "Madrid".into()],
            vision: "Make every storefront findable.".into(),
            online_services: vec!["SEO".into(), "social media".into(), "web design".into()],
        }
    }

    fn responder() -> ConversationResponder {
        ConversationResponder::new(
            profile(),
            ResponseCache::new(Duration::from_secs(3600), 8),
            None,
        )
    }

    #[tokio::test]
    async fn faq_matches_case_insensitive_substring() {
        let responder = responder();
        let reply = responder
            .respond("Hey, WHERE ARE YOU LOCATED exactly?")
            .await;
        assert!(reply.contains("Lisbon"));
        assert!(reply.contains("Porto"));
    }

    #[tokio::test]
    async fn first_faq_match_wins() {
        let responder = responder();
        // Contains both the services and the vision trigger; the services
        // entry sits earlier in the table.
        let reply = responder
            .respond("what are your services and what is your vision?")
            .await;
        assert!(reply.contains("SEO"));
    }

    #[tokio::test]
    async fn missing_bridge_degrades_to_apology() {
        let responder = responder();
        let reply = responder.respond("tell me something obscure").await;
        assert_eq!(reply, APOLOGY);
    }

    #[test]
    fn cache_key_is_raw_text() {
        let cache = ResponseCache::new(Duration::from_secs(3600), 8);
        cache.insert("Hello", "hi");
        assert_eq!(cache.get("Hello").as_deref(), Some("hi"));
        // Distinct casing and whitespace are distinct entries.
        assert!(cache.get("hello").is_none());
        assert!(cache.get("Hello ").is_none());
    }

    #[test]
    fn cache_expires_lazily() {
        let cache = ResponseCache::new(Duration::from_millis(10), 8);
        cache.insert("q", "a");
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get("q").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_evicts_oldest_at_capacity() {
        let cache = ResponseCache::new(Duration::from_secs(3600), 2);
        cache.insert("first", "1");
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("second", "2");
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("third", "3");
        assert!(cache.len() <= 2);
        assert!(cache.get("first").is_none());
        assert_eq!(cache.get("third").as_deref(), Some("3"));
    }

    #[test]
    fn postprocess_strips_emphasis_and_bounds_lines() {
        let raw = "**Line 1**\nline 2\nline 3\nline 4\nline 5\nline 6\nline 7";
        let cleaned = postprocess(raw);
        assert!(!cleaned.contains('*'));
        assert_eq!(cleaned.lines().count(), 6);
        assert!(cleaned.ends_with("line 6"));
    }

    #[test]
    fn profile_load_falls_back_to_default() {
        let profile = CompanyProfile::load("/nonexistent/profile.json");
        assert_eq!(profile.name, "the company");
    }
}
