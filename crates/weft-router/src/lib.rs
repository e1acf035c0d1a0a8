//! Router orchestration for the weft inter-domain fabric.
//!
//! This crate ties the lower layers together: configuration, logging, the
//! four-phase network setup driven by pluggable backends, the irrevocable
//! privilege drop, and the router object that owns every shared resource
//! and drives the packet pipeline.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod posix;
pub mod privileges;
pub mod router;
pub mod setup;

pub use backend::{BackendRegistry, NetworkBackend, SetupOutcome};
pub use config::RouterConfig;
pub use error::SetupError;
pub use router::{Router, ShutdownHandle};
