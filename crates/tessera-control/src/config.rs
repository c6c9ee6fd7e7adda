//! Control-plane configuration.

/// Configuration for the control services.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// How long a resolved feature-flag value is cached (default: 60).
    pub flag_cache_ttl_secs: u64,
    /// Upper bound on a single subsystem-adapter call (default: 10).
    pub adapter_timeout_secs: u64,
    /// Deletion SLA recorded on every deletion request; observable,
    /// not enforced (default: 30).
    pub deletion_sla_days: i64,
    /// Lifecycle event broadcast buffer (default: 256).
    pub event_buffer: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            flag_cache_ttl_secs: 60,
            adapter_timeout_secs: 10,
            deletion_sla_days: 30,
            event_buffer: 256,
        }
    }
}
