//! Concierge core: the engine behind the website-assistant gateway.
//!
//! Modules, leaf-first: the record-store adapter (remote document tree +
//! flat-file fallback) owns all collection writes; the scheduler enforces the
//! slot-conflict rule and the dual-write contract; the aggregator folds the
//! collections into the dashboard view; the responder answers chat via FAQ
//! table, bounded cache and the generative bridge. Telephony and spreadsheet
//! bridges are thin REST clients that degrade when unconfigured.

pub mod calendar;
pub mod config;
pub mod error;
pub mod identity;
pub mod llm;
pub mod metrics;
pub mod responder;
pub mod scheduler;
pub mod sheets;
pub mod store;
pub mod telephony;
pub mod types;

pub use config::GatewayConfig;
pub use error::{ExternalError, ScheduleError, StoreError};
pub use identity::{IdentityField, IdentityFields, IdentityResolver};
pub use llm::GenerativeBridge;
pub use metrics::DashboardAggregator;
pub use responder::{CompanyProfile, ConversationResponder, ResponseCache, APOLOGY};
pub use scheduler::{CancelOutcome, ScheduleOutcome, ScheduleRequest, Scheduler};
pub use sheets::SheetsClient;
pub use store::{
    DualStore, FlatFileStore, MemoryStore, RecordStore, RemoteStore, WriteOutcome,
    COLLECTION_APPOINTMENTS, COLLECTION_CONVERSATIONS, COLLECTION_LEADS, COLLECTION_USERS,
    COUNTER_TOTAL_USERS,
};
pub use telephony::{CallLog, TwilioClient};
pub use types::{
    parse_instant, Appointment, ChartSeries, ContactDetails, Conversation, DashboardMetrics,
    DashboardView, FormUser, Lead, LeadView, SessionUser, UserInfo, STATUS_CANCELLED,
    STATUS_SCHEDULED,
};
