//! Feature flag domain model.
//!
//! Flags are evaluated hierarchically: tenant override, then tier
//! default, then global default, then `false`.

use serde::{Deserialize, Serialize};

use crate::error::{TesseraError, TesseraResult};
use crate::models::tenant::Tier;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FlagScope {
    Tenant,
    Tier,
    Global,
}

impl FlagScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagScope::Tenant => "tenant",
            FlagScope::Tier => "tier",
            FlagScope::Global => "global",
        }
    }
}

/// A single flag setting. Unique on `(feature_name, scope, scope_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureFlag {
    pub feature_name: String,
    pub scope: FlagScope,
    /// Tenant id for `Tenant` scope, tier name for `Tier` scope,
    /// `None` for `Global`.
    pub scope_id: Option<String>,
    pub enabled: bool,
}

impl FeatureFlag {
    /// Validate scope/scope_id pairing: tenant and tier scopes require
    /// a scope id, global scope must not carry one.
    pub fn validate(&self) -> TesseraResult<()> {
        match (self.scope, &self.scope_id) {
            (FlagScope::Global, None) => Ok(()),
            (FlagScope::Global, Some(_)) => Err(TesseraError::InvalidArgument {
                message: "global flags must not carry a scope_id".into(),
            }),
            (_, None) => Err(TesseraError::InvalidArgument {
                message: format!("{} scope requires a scope_id", self.scope.as_str()),
            }),
            (FlagScope::Tier, Some(id)) => {
                if Tier::ALL.iter().any(|t| t.as_str() == id) {
                    Ok(())
                } else {
                    Err(TesseraError::InvalidArgument {
                        message: format!("unknown tier {id:?} in flag scope_id"),
                    })
                }
            }
            (FlagScope::Tenant, Some(_)) => Ok(()),
        }
    }
}
