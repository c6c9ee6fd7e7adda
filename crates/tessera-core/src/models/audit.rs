//! Audit log domain model.
//!
//! Every control action and isolation decision produces exactly one
//! append-only record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
    /// The operation proceeded in a degraded mode, e.g. a fail-open
    /// rate check while the counter store was down.
    Degraded,
    /// The operation was abandoned at shutdown.
    Interrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub operation: String,
    pub actor: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub outcome: AuditOutcome,
    /// Error kind label when the outcome is not `Success`.
    pub error_kind: Option<String>,
    /// Whether the outcome changed user-visible behavior.
    pub user_visible: bool,
}

impl AuditRecord {
    pub fn new(
        tenant_id: impl Into<String>,
        operation: impl Into<String>,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            tenant_id: tenant_id.into(),
            operation: operation.into(),
            actor: actor.into(),
            before: None,
            after: None,
            outcome,
            error_kind: None,
            user_visible: false,
        }
    }

    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }

    pub fn with_error_kind(mut self, kind: impl Into<String>) -> Self {
        self.error_kind = Some(kind.into());
        self
    }

    pub fn user_visible(mut self) -> Self {
        self.user_visible = true;
        self
    }
}
