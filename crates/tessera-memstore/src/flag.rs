//! In-memory implementation of [`FlagStore`].

use dashmap::DashMap;
use tessera_core::error::TesseraResult;
use tessera_core::models::flag::{FeatureFlag, FlagScope};
use tessera_core::repository::FlagStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlagKey {
    feature_name: String,
    scope: FlagScope,
    scope_id: Option<String>,
}

/// Flag settings keyed by `(feature_name, scope, scope_id)`.
#[derive(Default)]
pub struct MemoryFlagStore {
    flags: DashMap<FlagKey, FeatureFlag>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for MemoryFlagStore {
    async fn upsert(&self, flag: FeatureFlag) -> TesseraResult<()> {
        let key = FlagKey {
            feature_name: flag.feature_name.clone(),
            scope: flag.scope,
            scope_id: flag.scope_id.clone(),
        };
        self.flags.insert(key, flag);
        Ok(())
    }

    async fn get(
        &self,
        feature_name: &str,
        scope: FlagScope,
        scope_id: Option<&str>,
    ) -> TesseraResult<Option<FeatureFlag>> {
        let key = FlagKey {
            feature_name: feature_name.to_string(),
            scope,
            scope_id: scope_id.map(str::to_string),
        };
        Ok(self.flags.get(&key).map(|f| f.clone()))
    }

    async fn list(
        &self,
        scope: Option<FlagScope>,
        scope_id: Option<&str>,
    ) -> TesseraResult<Vec<FeatureFlag>> {
        let mut flags: Vec<FeatureFlag> = self
            .flags
            .iter()
            .filter(|entry| {
                let flag = entry.value();
                scope.is_none_or(|s| flag.scope == s)
                    && scope_id.is_none_or(|id| flag.scope_id.as_deref() == Some(id))
            })
            .map(|entry| entry.value().clone())
            .collect();
        flags.sort_by(|a, b| {
            (&a.feature_name, a.scope.as_str(), &a.scope_id)
                .cmp(&(&b.feature_name, b.scope.as_str(), &b.scope_id))
        });
        Ok(flags)
    }
}
