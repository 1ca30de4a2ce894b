//! Best-effort identity deduplication across user-like records.
//!
//! Conversations, session aggregates and form-captured users carry different
//! subsets of contact fields. To count "unique users" the aggregator reduces
//! each record to a single identity key: the first non-empty candidate in a
//! fixed priority order. The key has no collision-resistance guarantee; two
//! people sharing a phone number collapse into one.

use crate::types::{FormUser, SessionUser};

/// A candidate field an identity key can be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Email,
    Phone,
    SessionId,
}

/// Contact fields a key can be resolved from, independent of the record shape.
#[derive(Debug, Clone, Default)]
pub struct IdentityFields<'a> {
    pub email: &'a str,
    pub phone: &'a str,
    pub session_id: &'a str,
}

/// Ordered candidate-key strategy. The default order is
/// email → phone → session id; tests pin it.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    order: Vec<IdentityField>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self {
            order: vec![
                IdentityField::Email,
                IdentityField::Phone,
                IdentityField::SessionId,
            ],
        }
    }
}

impl IdentityResolver {
    /// A resolver with an explicit candidate order.
    pub fn with_order(order: Vec<IdentityField>) -> Self {
        Self { order }
    }

    /// First non-empty candidate value, or `None` when every field is blank.
    pub fn resolve(&self, fields: &IdentityFields<'_>) -> Option<String> {
        for field in &self.order {
            let value = match field {
                IdentityField::Email => fields.email,
                IdentityField::Phone => fields.phone,
                IdentityField::SessionId => fields.session_id,
            };
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
        None
    }

    /// Key for a session-derived user (session id participates).
    pub fn key_for_session_user(&self, user: &SessionUser) -> Option<String> {
        self.resolve(&IdentityFields {
            email: &user.email,
            phone: &user.phone,
            session_id: &user.session_id,
        })
    }

    /// Key for a form-captured user (no session id on that shape).
    pub fn key_for_form_user(&self, user: &FormUser) -> Option<String> {
        self.resolve(&IdentityFields {
            email: &user.email,
            phone: &user.phone,
            session_id: "",
        })
    }
}
