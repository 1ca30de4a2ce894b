//! Concierge Gateway: chat, appointment scheduling, lead capture, telephony
//! webhooks and a login-gated dashboard, backed by a remote document tree
//! with flat-file fallback.

mod dashboard;
mod handlers;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use concierge_core::{
    CallLog, CompanyProfile, ConversationResponder, DashboardAggregator, DualStore,
    FlatFileStore, GatewayConfig, GenerativeBridge, RecordStore, RemoteStore, ResponseCache,
    Scheduler, SheetsClient, TwilioClient,
};

use handlers::AppState;
use session::SessionStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();

    let files = match FlatFileStore::new(&config.data_dir) {
        Ok(files) => files,
        Err(err) => {
            tracing::error!("cannot open data directory {}: {err}", config.data_dir);
            std::process::exit(1);
        }
    };

    let primary: Option<Arc<dyn RecordStore>> = match RemoteStore::from_env() {
        Some(remote) => {
            tracing::info!("primary record store configured");
            Some(Arc::new(remote))
        }
        None => {
            tracing::warn!("primary record store not configured; flat files carry persistence");
            None
        }
    };
    let store = Arc::new(DualStore::new(primary, files));

    let profile = CompanyProfile::load(&config.company_profile_path);
    let bridge = GenerativeBridge::from_env();
    if bridge.is_none() {
        tracing::warn!("GENAI_API_KEY is not set; chat degrades to the apology line");
    }
    let responder = ConversationResponder::new(
        profile.clone(),
        ResponseCache::new(Duration::from_secs(config.cache_ttl_secs), config.cache_cap),
        bridge,
    );

    let telephony = TwilioClient::from_env();
    if telephony.is_none() {
        tracing::warn!("telephony credentials not set; outbound calls are disabled");
    }
    let sheets = SheetsClient::from_env();
    if sheets.is_none() {
        tracing::warn!("spreadsheet export not configured; call summaries stay local");
    }

    let state = Arc::new(AppState {
        scheduler: Scheduler::new(Arc::clone(&store), &config.artifacts_dir),
        aggregator: DashboardAggregator::new(Arc::clone(&store)),
        responder,
        profile,
        telephony,
        sheets,
        call_log: CallLog::new(),
        sessions: SessionStore::new(),
        store,
        config: config.clone(),
    });

    let app = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/send_message", post(handlers::send_message))
        .route("/schedule_appointment", post(handlers::schedule_appointment))
        .route("/get_appointments", get(handlers::get_appointments))
        .route("/cancel_appointment", post(handlers::cancel_appointment))
        .route("/create_lead", post(handlers::create_lead))
        .route("/set_user_session", post(handlers::set_user_session))
        .route("/store_user_data", post(handlers::store_user_data))
        .route("/get_users_data", get(handlers::get_users_data))
        .route("/login", get(handlers::login_page).post(handlers::login_submit))
        .route("/logout", get(handlers::logout))
        .route("/dashboard", get(handlers::dashboard_page))
        .route("/voice", post(handlers::voice))
        .route("/handle-voice-input", post(handlers::handle_voice_input))
        .route("/call-completed", post(handlers::call_completed))
        .route("/initiate-call", post(handlers::initiate_call))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("concierge gateway listening on {addr}");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("cannot bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("server exited: {err}");
        std::process::exit(1);
    }
}
