//! RECAST Verifier Gateway
//!
//! Switchable boundary around the external correctness oracle:
//! - [`VerifierGateway`] trait consumed by the replacer and engine
//! - [`CommandVerifier`] production backend (external build/test process)
//! - Structured [`Verification`] results; timeouts reported as failures
//!
//! The engine never depends on the concrete invocation mechanism, and a
//! gateway call never mutates source files.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod command;
pub mod error;
pub mod gateway;

pub use command::{CommandVerifier, CommandVerifierConfig};
pub use error::VerifyError;
pub use gateway::{Verification, VerifierGateway, VerifyScope};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
