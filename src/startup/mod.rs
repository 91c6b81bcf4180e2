//! Provider startup supervision.
//!
//! When a provider does not answer its health check, the supervisor can run
//! the provider's configured startup command and poll until the provider
//! becomes ready, the command fails, or the startup timeout expires.
//!
//! Setting `PROVIDER_READY_SKIP_STARTUP=1` disables running startup commands
//! entirely; unreachable providers then fail fast.

mod ensure;
mod error;
mod process;

pub use ensure::{is_startup_disabled, StartupSupervisor, SKIP_STARTUP_ENV};
pub use error::StartupError;
