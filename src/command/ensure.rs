use anyhow::{bail, Result};
use std::io::Write;

use super::CommandEnv;
use crate::config::ConfigProvider;
use crate::startup::{is_startup_disabled, StartupError, SKIP_STARTUP_ENV};

/// Make sure one provider is reachable, running its startup command if
/// needed.
pub async fn run_ensure(env: &CommandEnv, provider_id: &str, out: &mut impl Write) -> Result<()> {
    let Some(provider) = env.config.provider(provider_id) else {
        bail!("provider not found: {}", provider_id);
    };
    if provider.disable {
        bail!("provider {} is disabled", provider_id);
    }

    if let Err(e) = env
        .supervisor
        .ensure_ready(&provider, &env.working_dir, &env.cancel)
        .await
    {
        let blocked = matches!(e, StartupError::UnreachableNoRemedy { .. })
            && provider.startup_command().is_some()
            && is_startup_disabled();
        if blocked {
            writeln!(
                out,
                "⚠️  Startup commands are disabled by {}",
                SKIP_STARTUP_ENV
            )?;
        }
        return Err(e.into());
    }

    writeln!(out, "✅ Provider {} is ready", provider.display_name())?;
    Ok(())
}
