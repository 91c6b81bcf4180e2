use anyhow::Result;
use std::io::Write;

use super::CommandEnv;
use crate::config::{ConfigProvider, ProviderEndpoint};

/// Probe every configured provider, optionally starting unreachable ones.
pub async fn run_doctor(env: &CommandEnv, attempt_start: bool, out: &mut impl Write) -> Result<()> {
    let providers = env.config.providers();

    writeln!(out, "Checking providers...")?;
    if !env.config.is_loaded() {
        writeln!(out, "No configuration found at {:?}", env.config.path())?;
        return Ok(());
    }
    if providers.is_empty() {
        writeln!(out, "No providers configured in {:?}", env.config.path())?;
        return Ok(());
    }

    for provider in providers {
        let name = provider.id.as_str();
        if provider.disable {
            writeln!(out, "- {}: disabled", name)?;
            continue;
        }

        let result = env
            .supervisor
            .prober()
            .check_health(&provider, &env.cancel)
            .await;

        if let Some(err) = &result.error {
            writeln!(out, "- {}: health check failed ({})", name, err)?;
            write_location(out, &provider)?;
            continue;
        }

        if result.ready {
            if provider.base_url.is_empty() {
                writeln!(out, "- {}: ready", name)?;
            } else {
                writeln!(out, "- {}: ready (url: {})", name, provider.base_url)?;
            }
            continue;
        }

        let detail = if result.detail.is_empty() {
            "no response".to_string()
        } else {
            result.detail.clone()
        };

        if !attempt_start || provider.startup_command().is_none() {
            writeln!(out, "- {}: unreachable ({})", name, detail)?;
            write_location(out, &provider)?;
            if provider.startup_command().is_some() {
                writeln!(
                    out,
                    "  hint: try 'provider-ready doctor --start' to auto-start this provider"
                )?;
            }
            continue;
        }

        writeln!(out, "- {}: unreachable ({}), attempting startup...", name, detail)?;
        match env
            .supervisor
            .ensure_ready_from(&provider, result, &env.working_dir, &env.cancel)
            .await
        {
            Ok(()) => writeln!(out, "  ✓ provider is ready")?,
            Err(e) if e.is_process_failure() => {
                writeln!(out, "  ✗ startup command failed: {}", e)?
            }
            Err(e) => writeln!(out, "  ✗ startup failed: {}", e)?,
        }
    }

    Ok(())
}

fn write_location(out: &mut impl Write, provider: &ProviderEndpoint) -> Result<()> {
    if !provider.base_url.is_empty() {
        writeln!(out, "  url: {}", provider.base_url)?;
    }
    if let Some(path) = provider.startup_health_path.as_deref() {
        writeln!(
            out,
            "  health: {} (timeout {}s)",
            path,
            provider.startup_timeout_secs()
        )?;
    }
    Ok(())
}
