//! Tessera Core — Domain models, error types, store traits, ambient
//! tenant context, and the tenant lifecycle state machine.
//!
//! This crate has no I/O of its own. Store implementations live in
//! `tessera-memstore`; the service layers (`tessera-control`,
//! `tessera-enforce`, `tessera-billing`) are generic over the traits
//! defined here.

pub mod context;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod models;
pub mod repository;

pub use context::RequestContext;
pub use error::{TesseraError, TesseraResult};
