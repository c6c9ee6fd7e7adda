//! Domain models for the Tessera control plane.
//!
//! These are the core types shared across all crates. The registry
//! exclusively owns `Tenant`, `FeatureFlag`, and quota records;
//! everything else is derived from them or from usage signals.

pub mod audit;
pub mod certificate;
pub mod flag;
pub mod forecast;
pub mod incident;
pub mod tenant;
pub mod usage;
