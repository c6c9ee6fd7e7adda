//! Tessera Control — the authoritative side of the control plane:
//! tenant registry, lifecycle state management with event fan-out,
//! hierarchical feature flags, the cascading operator, and the
//! deletion workflow.
//!
//! Services are generic over the store traits in `tessera-core` and
//! carry no dependency on any concrete store.

pub mod audit;
pub mod cascade;
pub mod config;
pub mod deletion;
pub mod flags;
pub mod lifecycle;
pub mod locks;
pub mod registry;

pub use audit::AuditTrail;
pub use cascade::{CascadeAction, CascadeOperator, CascadeReport};
pub use config::ControlConfig;
pub use deletion::{DeletionOutcome, DeletionWorkflow};
pub use flags::FlagService;
pub use lifecycle::{LifecycleEvent, LifecycleEvents, LifecycleManager};
pub use registry::{RegistryStats, TenantRegistry};
