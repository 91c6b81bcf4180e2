//! Ensure a provider is reachable, starting it if necessary.
//!
//! ```text
//! probe ──ready──────────────────────────────▶ Ok
//!   │
//!   └─not ready─┬─ no command / disabled ────▶ UnreachableNoRemedy
//!               └─ spawn ─▶ race {
//!                     child exits 0      → keep polling (may have daemonized)
//!                     child exits ≠ 0    → ProcessExit
//!                     poll tick, ready   → Ok
//!                     deadline / cancel  → kill child, Timeout
//!                  }
//! ```

use std::path::Path;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::StartupError;
use super::process::spawn_shell;
use crate::config::ProviderEndpoint;
use crate::domain::ReadinessResult;
use crate::probe::HealthProber;

/// Interval between readiness probes while a startup command runs.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Detail reported when the caller cancels before the provider is ready.
const CANCELLED_DETAIL: &str = "startup cancelled";

/// Environment variable that disables running startup commands.
pub const SKIP_STARTUP_ENV: &str = "PROVIDER_READY_SKIP_STARTUP";

/// Check whether automatic startup has been disabled via
/// [`SKIP_STARTUP_ENV`].
pub fn is_startup_disabled() -> bool {
    match std::env::var(SKIP_STARTUP_ENV) {
        Ok(val) => {
            let val_lower = val.trim().to_lowercase();
            matches!(val_lower.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => false,
    }
}

/// Brings unreachable providers up using their configured startup command.
#[derive(Clone)]
pub struct StartupSupervisor {
    prober: HealthProber,
    poll_interval: Duration,
    startup_disabled: bool,
}

impl StartupSupervisor {
    pub fn new(prober: HealthProber) -> Self {
        let startup_disabled = is_startup_disabled();
        if startup_disabled {
            debug!("Provider startup commands disabled via {}", SKIP_STARTUP_ENV);
        }
        Self {
            prober,
            poll_interval: POLL_INTERVAL,
            startup_disabled,
        }
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[cfg(test)]
    pub fn with_startup_disabled(mut self, disabled: bool) -> Self {
        self.startup_disabled = disabled;
        self
    }

    pub fn prober(&self) -> &HealthProber {
        &self.prober
    }

    /// Make sure `endpoint` answers its health check.
    ///
    /// Providers without a base URL have nothing to check and succeed
    /// immediately. Otherwise the provider is probed once; if it is not
    /// ready and has a startup command, the command runs in `working_dir`
    /// while the provider is polled every [`POLL_INTERVAL`] until it becomes
    /// ready, the command fails, or the startup timeout elapses. Cancelling
    /// `cancel` is handled like the timeout. A command still running when the
    /// provider turns ready is left running.
    pub async fn ensure_ready(
        &self,
        endpoint: &ProviderEndpoint,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), StartupError> {
        let initial = self.prober.check_health(endpoint, cancel).await;
        self.ensure_ready_from(endpoint, initial, working_dir, cancel)
            .await
    }

    /// Same as [`ensure_ready`](Self::ensure_ready), starting from a probe
    /// result the caller already has.
    pub async fn ensure_ready_from(
        &self,
        endpoint: &ProviderEndpoint,
        initial: ReadinessResult,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), StartupError> {
        let provider = endpoint.display_name().to_string();

        if let Some(source) = initial.error {
            return Err(StartupError::Configuration { provider, source });
        }
        if initial.ready {
            debug!("Provider {} is ready", provider);
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(StartupError::Timeout {
                provider,
                seconds: endpoint.startup_timeout_secs(),
                detail: CANCELLED_DETAIL.to_string(),
            });
        }

        let detail = if initial.detail.is_empty() {
            "no response".to_string()
        } else {
            initial.detail
        };

        let Some(command) = endpoint.startup_command() else {
            return Err(StartupError::UnreachableNoRemedy { provider, detail });
        };
        if self.startup_disabled {
            info!(
                "Not starting provider {}: startup disabled via {}",
                provider, SKIP_STARTUP_ENV
            );
            return Err(StartupError::UnreachableNoRemedy { provider, detail });
        }

        self.run_startup(endpoint, command, working_dir, detail, cancel)
            .await
    }

    async fn run_startup(
        &self,
        endpoint: &ProviderEndpoint,
        command: &str,
        working_dir: &Path,
        mut last_detail: String,
        cancel: &CancellationToken,
    ) -> Result<(), StartupError> {
        let provider = endpoint.display_name().to_string();
        let seconds = endpoint.startup_timeout_secs();

        info!(
            provider = %provider,
            command = %command,
            timeout_secs = seconds,
            "Attempting to start provider"
        );

        let mut child =
            spawn_shell(command, working_dir).map_err(|source| StartupError::ProcessSpawn {
                provider: provider.clone(),
                command: command.to_string(),
                source,
            })?;

        let deadline = sleep_until(Instant::now() + endpoint.startup_timeout());
        tokio::pin!(deadline);

        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut exited = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child, exited, &provider).await;
                    return Err(StartupError::Timeout {
                        provider,
                        seconds,
                        detail: CANCELLED_DETAIL.to_string(),
                    });
                }
                _ = &mut deadline => {
                    terminate(&mut child, exited, &provider).await;
                    return Err(StartupError::Timeout { provider, seconds, detail: last_detail });
                }
                status = child.wait(), if !exited => match status {
                    Ok(status) if status.success() => {
                        debug!("Startup command for {} exited cleanly; polling continues", provider);
                        exited = true;
                    }
                    Ok(status) => {
                        return Err(StartupError::ProcessExit {
                            provider,
                            reason: status.to_string(),
                        });
                    }
                    Err(e) => {
                        return Err(StartupError::ProcessExit {
                            provider,
                            reason: format!("failed to wait for startup command: {}", e),
                        });
                    }
                },
                _ = ticker.tick() => {
                    // A probe still in flight when the deadline fires is
                    // abandoned; the next iteration reports the timeout.
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => continue,
                        _ = &mut deadline => continue,
                        result = self.prober.check_health(endpoint, cancel) => result,
                    };

                    if let Some(err) = result.error {
                        last_detail = err.to_string();
                    } else if result.ready {
                        info!("Provider {} is ready", provider);
                        if !exited {
                            detach(child, provider);
                        }
                        return Ok(());
                    } else {
                        debug!("Provider {} not ready yet: {}", provider, result.detail);
                        last_detail = result.detail;
                    }
                }
            }
        }
    }
}

/// Leave a running startup command alone, reaping it once it exits.
fn detach(mut child: Child, provider: String) {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("Startup command for {} exited: {}", provider, status),
            Err(e) => warn!("Failed to wait for startup command of {}: {}", provider, e),
        }
    });
}

async fn terminate(child: &mut Child, exited: bool, provider: &str) {
    if exited {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!("Failed to stop startup command for {}: {}", provider, e);
    }
}
