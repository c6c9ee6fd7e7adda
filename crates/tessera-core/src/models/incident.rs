//! Incident domain model, raised by the blast-radius detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IncidentPriority {
    /// Customer-reported only.
    P2,
    /// 3x..10x deviation on error rate or latency.
    P1,
    /// Sustained >10x error spike or >5x latency p95.
    P0,
}

impl IncidentPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentPriority::P0 => "P0",
            IncidentPriority::P1 => "P1",
            IncidentPriority::P2 => "P2",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub tenant_id: String,
    pub priority: IncidentPriority,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Short machine-generated hint at the triggering signal.
    pub root_hint: String,
    /// Mitigations applied while the incident was open.
    pub actions_taken: Vec<String>,
}

impl Incident {
    pub fn open(
        tenant_id: impl Into<String>,
        priority: IncidentPriority,
        root_hint: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            priority,
            opened_at: Utc::now(),
            closed_at: None,
            root_hint: root_hint.into(),
            actions_taken: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}
