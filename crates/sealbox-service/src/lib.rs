//! sealbox-service — async dispatch layer over the crypto core
//!
//! Offloads CPU-heavy envelope crypto to an isolated worker without
//! blocking the caller. One logical call = one correlated request = exactly
//! one response or one timeout, never both and never neither.
//!
//! # Module layout
//! - `service`     — `SealboxService` public handle (encrypt / decrypt / shutdown)
//! - `worker`      — singleton worker loop + per-call crypto pipeline
//! - `correlation` — request ids and action tags
//! - `config`      — `ServiceConfig`
//! - `error`       — `Error` / `DispatchError`

pub mod config;
pub mod correlation;
pub mod error;
pub mod service;
pub mod worker;

pub use config::ServiceConfig;
pub use error::{DispatchError, Error};
pub use service::SealboxService;

pub use sealbox_core::{Envelope, EnvelopeVersion, Payload};
