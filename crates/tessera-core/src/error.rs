//! Error types for the Tessera control plane.

use thiserror::Error;

use crate::models::tenant::TenantStatus;

#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        from: TenantStatus,
        to: TenantStatus,
    },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Resource exhausted: {resource}, retry after {retry_after_secs}s")]
    ResourceExhausted {
        resource: &'static str,
        retry_after_secs: u64,
    },

    #[error("Failed precondition: {message}")]
    FailedPrecondition { message: String },

    #[error("Unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Tenant context missing for the current task")]
    NoTenantContext,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TesseraError {
    /// Stable lowercase kind label, used in audit records and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::FailedPrecondition { .. } => "failed_precondition",
            Self::Unavailable { .. } => "unavailable",
            Self::NoTenantContext => "no_tenant_context",
            Self::Internal(_) => "internal",
        }
    }
}

pub type TesseraResult<T> = Result<T, TesseraError>;
