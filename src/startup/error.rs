use std::io;

use crate::probe::ProbeError;

/// Structural failures of a startup attempt.
///
/// Routine unreachability never shows up here on its own; it only becomes
/// an error once no remedy is left (`UnreachableNoRemedy`) or the deadline
/// passes (`Timeout`).
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The health URL could not be built from the provider configuration.
    #[error("provider {provider} health check failed: {source}")]
    Configuration {
        provider: String,
        #[source]
        source: ProbeError,
    },

    /// The startup command could not be launched.
    #[error("failed to start provider {provider} with `{command}`: {source}")]
    ProcessSpawn {
        provider: String,
        command: String,
        #[source]
        source: io::Error,
    },

    /// The startup command exited unsuccessfully.
    #[error("provider {provider} startup command failed: {reason}")]
    ProcessExit { provider: String, reason: String },

    /// The provider stayed unreachable until the deadline.
    #[error("provider {provider} did not become ready within {seconds} seconds ({detail})")]
    Timeout {
        provider: String,
        seconds: u64,
        detail: String,
    },

    /// Not reachable, and there is nothing configured (or allowed) to fix it.
    #[error(
        "provider {provider} is unreachable ({detail}); select a different provider \
         or configure a startup_command for it"
    )]
    UnreachableNoRemedy { provider: String, detail: String },
}

impl StartupError {
    /// Whether the failure comes from the startup process itself rather than
    /// the provider's reachability.
    pub fn is_process_failure(&self) -> bool {
        matches!(
            self,
            StartupError::ProcessSpawn { .. } | StartupError::ProcessExit { .. }
        )
    }
}
