//! Telephony integration: TwiML responses for the voice webhooks, the
//! per-call transcript buffer, and outbound call creation.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;

use crate::error::ExternalError;

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const VOICE: &str = "Polly.Amy";

/// Hard caps on the transcript buffer. Calls beyond the cap evict the oldest
/// tracked call; exchanges beyond the per-call cap are dropped.
const MAX_TRACKED_CALLS: usize = 64;
const MAX_EXCHANGES_PER_CALL: usize = 100;

/// TwiML greeting: speech gather that posts to the voice-input webhook, with
/// a retry redirect when the caller stays silent.
pub fn greeting_twiml(company_name: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response>\
         <Gather input=\"speech\" action=\"/handle-voice-input\" method=\"POST\">\
         <Say voice=\"{VOICE}\">Welcome to {}. How can I help you today?</Say>\
         </Gather>\
         <Say voice=\"{VOICE}\">I didn't catch that. Please try again.</Say>\
         <Redirect>/voice</Redirect>\
         </Response>",
        xml_escape(company_name)
    )
}

/// TwiML speaking the bot reply, then gathering the next utterance.
pub fn reply_twiml(reply: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response>\
         <Say voice=\"{VOICE}\">{}</Say>\
         <Gather input=\"speech\" action=\"/handle-voice-input\" method=\"POST\">\
         <Say voice=\"{VOICE}\">Is there anything else I can help you with?</Say>\
         </Gather>\
         </Response>",
        xml_escape(reply)
    )
}

/// TwiML for an empty transcription: retry prompt + redirect to the greeting.
pub fn retry_twiml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response>\
         <Say voice=\"{VOICE}\">I didn't catch that. Please try again.</Say>\
         <Redirect>/voice</Redirect>\
         </Response>"
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// One spoken exchange on a call.
#[derive(Debug, Clone)]
pub struct CallExchange {
    pub user: String,
    pub bot: String,
    pub timestamp: String,
}

/// In-process transcript buffer keyed by call id, drained when the call
/// completes. Bounded on both axes.
#[derive(Default)]
pub struct CallLog {
    calls: DashMap<String, Vec<CallExchange>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one exchange to the call's transcript.
    pub fn record(&self, call_sid: &str, user: &str, bot: &str) {
        if !self.calls.contains_key(call_sid) && self.calls.len() >= MAX_TRACKED_CALLS {
            self.evict_oldest();
        }
        let mut transcript = self.calls.entry(call_sid.to_string()).or_default();
        if transcript.len() >= MAX_EXCHANGES_PER_CALL {
            tracing::warn!("transcript for {call_sid} is full, dropping exchange");
            return;
        }
        transcript.push(CallExchange {
            user: user.to_string(),
            bot: bot.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    /// Removes the call and renders its transcript as a summary block.
    pub fn take_summary(&self, call_sid: &str) -> Option<String> {
        let (_, transcript) = self.calls.remove(call_sid)?;
        let mut summary = String::from("Call Summary:\n");
        for exchange in transcript {
            summary.push_str(&format!(
                "User: {}\nBot: {}\nTime: {}\n\n",
                exchange.user, exchange.bot, exchange.timestamp
            ));
        }
        Some(summary)
    }

    pub fn tracked_calls(&self) -> usize {
        self.calls.len()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .calls
            .iter()
            .min_by(|a, b| {
                let a_first = a.value().first().map(|e| e.timestamp.clone());
                let b_first = b.value().first().map(|e| e.timestamp.clone());
                a_first.cmp(&b_first)
            })
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            tracing::warn!("call buffer full, dropping transcript for {key}");
            self.calls.remove(&key);
        }
    }
}

#[derive(Deserialize)]
struct CallCreated {
    sid: String,
}

/// Outbound-call client. Credentials from the environment; absence disables
/// the feature rather than failing startup.
pub struct TwilioClient {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioClient {
    /// Build from `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN` /
    /// `TWILIO_PHONE_NUMBER`. Returns `None` when any of them is unset.
    pub fn from_env() -> Option<Self> {
        let account_sid = non_empty_env("TWILIO_ACCOUNT_SID")?;
        let auth_token = non_empty_env("TWILIO_AUTH_TOKEN")?;
        let from_number = non_empty_env("TWILIO_PHONE_NUMBER")?;
        Some(Self::new(account_sid, auth_token, from_number))
    }

    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            account_sid,
            auth_token,
            from_number,
            client,
        }
    }

    /// Starts an outbound call wired to the voice webhook, with a completion
    /// callback. Returns the provider's call id.
    pub async fn initiate_call(
        &self,
        to_number: &str,
        voice_url: &str,
        status_callback_url: &str,
    ) -> Result<String, ExternalError> {
        let url = format!("{}/Accounts/{}/Calls.json", API_BASE, self.account_sid);
        let params = [
            ("To", to_number),
            ("From", self.from_number.as_str()),
            ("Url", voice_url),
            ("StatusCallback", status_callback_url),
            ("StatusCallbackEvent", "completed"),
            ("StatusCallbackMethod", "POST"),
        ];

        tracing::info!("initiating call to {to_number} from {}", self.from_number);
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(ExternalError::from_reqwest)?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ExternalError::Service(format!(
                "call create failed {status}: {body}"
            )));
        }

        let created: CallCreated = res.json().await.map_err(ExternalError::from_reqwest)?;
        Ok(created.sid)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
