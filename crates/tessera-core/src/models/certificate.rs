//! Deletion certificate domain model.
//!
//! Emitted at the end of the deletion workflow as the signed record of
//! erasure across all subsystems. The signature is computed by the
//! workflow (`tessera-control::deletion`) over the canonicalized
//! payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Receipt returned by a subsystem adapter after `on_delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionReceipt {
    /// Adapter name, e.g. `vector-store`.
    pub system: String,
    pub deleted_at: DateTime<Utc>,
    /// True when the store could not fully erase and residual data
    /// remains pending anonymization.
    pub residual: bool,
}

/// Per-system verification outcome embedded in the certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemErasure {
    pub system: String,
    pub deleted: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionCertificate {
    pub certificate_id: Uuid,
    pub tenant_id: String,
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub systems: Vec<SystemErasure>,
    /// False produces a conditional certificate that blocks closure of
    /// the deletion request.
    pub verification_complete: bool,
    /// Hex SHA-256 digest over the canonicalized payload.
    pub signature: String,
}
