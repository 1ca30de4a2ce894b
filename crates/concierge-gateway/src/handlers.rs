//! Route handlers: chat, scheduling, leads, users, session, dashboard and
//! the telephony webhooks.
//!
//! Only request-shape validation maps to 4xx responses. Collaborator
//! failures degrade in place: a warning in the JSON payload, an apology line,
//! or an empty dashboard section, never a 5xx caused by a remote system.

use std::sync::Arc;

use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use concierge_core::{
    telephony, CallLog, CompanyProfile, Conversation, ConversationResponder, DashboardAggregator,
    DualStore, GatewayConfig, Lead, ScheduleError, ScheduleRequest, Scheduler, SheetsClient,
    StoreError, TwilioClient, UserInfo,
};

use crate::dashboard;
use crate::session::{new_session_id, session_id_from_headers, set_cookie_value, SessionStore};

pub struct AppState {
    pub config: GatewayConfig,
    pub store: Arc<DualStore>,
    pub scheduler: Scheduler,
    pub aggregator: DashboardAggregator,
    pub responder: ConversationResponder,
    pub profile: CompanyProfile,
    pub telephony: Option<TwilioClient>,
    pub sheets: Option<SheetsClient>,
    pub call_log: CallLog,
    pub sessions: SessionStore,
}

const INDEX_HTML: &str = include_str!("../static/index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> &'static str {
    "OK"
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ChatRequest {
    message: String,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Json<serde_json::Value> {
    tracing::debug!("chat message received");
    let reply = state.responder.respond(&body.message).await;

    let sid = session_id_from_headers(&headers);
    let session = sid
        .as_deref()
        .and_then(|sid| state.sessions.get(sid))
        .unwrap_or_default();
    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        user_message: body.message,
        bot_response: reply.clone(),
        timestamp: Utc::now().timestamp_millis(),
        session_id: sid.unwrap_or_else(|| "default".to_string()),
        user_details: concierge_core::ContactDetails {
            name: if session.name.is_empty() {
                "Anonymous".to_string()
            } else {
                session.name
            },
            email: session.email,
            phone: session.phone,
        },
    };
    if let Err(err) = state.store.record_conversation(&conversation).await {
        tracing::warn!("conversation not persisted: {err}");
    }

    Json(json!({ "response": reply }))
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ScheduleBody {
    title: String,
    time: String,
    notes: String,
    user_name: String,
    user_email: String,
    user_phone: String,
    user_company: String,
}

pub async fn schedule_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ScheduleBody>,
) -> Response {
    let session = session_id_from_headers(&headers)
        .and_then(|sid| state.sessions.get(&sid))
        .unwrap_or_default();
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = ScheduleRequest {
        title: body.title,
        time: body.time,
        notes: body.notes,
        user: UserInfo {
            name: body.user_name,
            email: body.user_email,
            phone: body.user_phone,
            company: body.user_company,
        },
        session_user: UserInfo {
            name: session.name,
            email: session.email,
            phone: session.phone,
            company: session.company,
        },
        user_agent,
    };

    match state.scheduler.schedule(request).await {
        Ok(outcome) => {
            let appointment_id = outcome.appointment.id.clone();
            let mut payload = json!({
                "message": "Appointment scheduled successfully",
                "appointment": outcome.appointment,
                "appointment_id": appointment_id,
            });
            if !outcome.warnings.is_empty() {
                payload["warnings"] = json!(outcome.warnings);
            }
            Json(payload).into_response()
        }
        Err(ScheduleError::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        Err(ScheduleError::Conflict { existing }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "This time slot is already booked. Please choose a different time.",
                "existing_appointment": existing,
            })),
        )
            .into_response(),
        Err(ScheduleError::Store(err)) => {
            tracing::error!("schedule failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn get_appointments(State(state): State<Arc<AppState>>) -> Response {
    match state.scheduler.list().await {
        Ok(appointments) => Json(json!({ "appointments": appointments })).into_response(),
        Err(err) => {
            tracing::error!("appointment listing failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CancelBody {
    appointment_id: String,
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CancelBody>,
) -> Response {
    let id = body.appointment_id.trim();
    if id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Appointment ID is required" })),
        )
            .into_response();
    }

    match state.scheduler.cancel(id).await {
        Ok(outcome) => {
            let mut payload = json!({
                "message": "Appointment cancelled successfully",
                "appointment_id": id,
                "appointment": outcome.appointment,
            });
            if !outcome.warnings.is_empty() {
                payload["warnings"] = json!(outcome.warnings);
            }
            Json(payload).into_response()
        }
        Err(err) => {
            tracing::error!("cancel failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Leads and captured users
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LeadBody {
    name: String,
    email: String,
    phone: String,
    message: String,
}

pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LeadBody>,
) -> Response {
    let name = body.name.trim();
    let email = body.email.trim();
    let phone = body.phone.trim();
    if name.is_empty() || (email.is_empty() && phone.is_empty()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Name and at least one contact (email or phone) are required.",
            })),
        )
            .into_response();
    }

    let lead = Lead {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        message: body.message.trim().to_string(),
        source: "chatbot".to_string(),
        created_at: Utc::now().timestamp_millis(),
    };

    match state.store.create_lead(&lead).await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Lead submitted successfully",
            "lead_id": lead.id,
        }))
        .into_response(),
        Err(StoreError::Unavailable(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "Lead storage is not configured (record store is unavailable).",
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("lead write failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct StoreUserBody {
    name: String,
    email: String,
    phone: String,
    company: String,
}

pub async fn store_user_data(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StoreUserBody>,
) -> Json<serde_json::Value> {
    let user = concierge_core::FormUser {
        name: body.name.trim().to_string(),
        email: body.email.trim().to_string(),
        phone: body.phone.trim().to_string(),
        company: body.company.trim().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        source: "chatbot_form".to_string(),
    };

    match state.store.store_form_user(&user).await {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                tracing::warn!("user capture degraded: {warning}");
            }
        }
        Err(err) => tracing::error!("local user backup failed: {err}"),
    }

    Json(json!({ "success": true, "message": "User data stored successfully" }))
}

pub async fn get_users_data(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let users = state.store.load_users().await;
    Json(json!({ "users": users }))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SessionProfileBody {
    name: String,
    email: String,
    phone: String,
    company: String,
}

pub async fn set_user_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SessionProfileBody>,
) -> Response {
    let (sid, fresh) = match session_id_from_headers(&headers) {
        Some(sid) => (sid, false),
        None => (new_session_id(), true),
    };
    state
        .sessions
        .update_profile(&sid, &body.name, &body.email, &body.phone, &body.company);
    tracing::info!("session profile updated for {sid}");

    let payload = Json(json!({ "success": true }));
    if fresh {
        ([(header::SET_COOKIE, set_cookie_value(&sid))], payload).into_response()
    } else {
        payload.into_response()
    }
}

// ---------------------------------------------------------------------------
// Login and dashboard
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginQuery {
    next: Option<String>,
}

pub async fn login_page() -> Html<String> {
    Html(dashboard::render_login(None))
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let ok = form.username.trim() == state.config.dashboard_user
        && form.password.trim() == state.config.dashboard_pass;
    if !ok {
        return Html(dashboard::render_login(Some("Invalid credentials"))).into_response();
    }

    let (sid, fresh) = match session_id_from_headers(&headers) {
        Some(sid) => (sid, false),
        None => (new_session_id(), true),
    };
    state.sessions.set_logged_in(&sid, true);

    let dest = query.next.unwrap_or_else(|| "/dashboard".to_string());
    let redirect = Redirect::to(&dest);
    if fresh {
        ([(header::SET_COOKIE, set_cookie_value(&sid))], redirect).into_response()
    } else {
        redirect.into_response()
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    if let Some(sid) = session_id_from_headers(&headers) {
        state.sessions.clear(&sid);
    }
    Redirect::to("/login")
}

pub async fn dashboard_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let logged_in = session_id_from_headers(&headers)
        .map(|sid| state.sessions.is_logged_in(&sid))
        .unwrap_or(false);
    if !logged_in {
        return Redirect::to("/login?next=/dashboard").into_response();
    }
    let view = state.aggregator.compute().await;
    Html(dashboard::render_dashboard(&view)).into_response()
}

// ---------------------------------------------------------------------------
// Telephony webhooks (form-encoded provider callbacks)
// ---------------------------------------------------------------------------

fn twiml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

pub async fn voice(State(state): State<Arc<AppState>>) -> Response {
    twiml(telephony::greeting_twiml(&state.profile.name))
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct VoiceInputForm {
    #[serde(rename = "SpeechResult")]
    speech_result: String,
    #[serde(rename = "CallSid")]
    call_sid: String,
}

pub async fn handle_voice_input(
    State(state): State<Arc<AppState>>,
    Form(form): Form<VoiceInputForm>,
) -> Response {
    let speech = form.speech_result.trim();
    if speech.is_empty() {
        return twiml(telephony::retry_twiml());
    }

    let reply = state.responder.respond(speech).await;
    let call_sid = if form.call_sid.is_empty() {
        "unknown".to_string()
    } else {
        form.call_sid
    };
    state.call_log.record(&call_sid, speech, &reply);
    twiml(telephony::reply_twiml(&reply))
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CallCompletedForm {
    #[serde(rename = "CallSid")]
    call_sid: String,
    #[serde(rename = "CallDuration")]
    call_duration: String,
    #[serde(rename = "To")]
    to: String,
}

pub async fn call_completed(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CallCompletedForm>,
) -> StatusCode {
    let Some(summary) = state.call_log.take_summary(&form.call_sid) else {
        return StatusCode::OK;
    };

    match &state.sheets {
        Some(sheets) => {
            if let Err(err) = sheets
                .append_call_summary(&form.call_sid, &form.to, &form.call_duration, &summary)
                .await
            {
                tracing::warn!("call summary for {} not exported: {err}", form.call_sid);
            }
        }
        None => tracing::warn!(
            "spreadsheet export not configured, dropping summary for {}",
            form.call_sid
        ),
    }
    StatusCode::OK
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct InitiateCallBody {
    phone_number: String,
}

pub async fn initiate_call(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InitiateCallBody>,
) -> Response {
    let to_number = body.phone_number.trim();
    if to_number.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Phone number is required" })),
        )
            .into_response();
    }

    let Some(telephony_client) = &state.telephony else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "Telephony is not configured on the server.",
            })),
        )
            .into_response();
    };

    match telephony_client
        .initiate_call(
            to_number,
            &state.config.twilio_voice_webhook_url,
            &state.config.twilio_status_callback_url,
        )
        .await
    {
        Ok(call_sid) => Json(json!({
            "success": true,
            "message": "Call initiated successfully",
            "call_sid": call_sid,
        }))
        .into_response(),
        Err(err) => {
            tracing::error!("call initiation failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": err.to_string() })),
            )
                .into_response()
        }
    }
}
