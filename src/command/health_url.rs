use anyhow::{Context, Result};
use std::io::Write;

use super::CommandEnv;
use crate::config::ConfigProvider;
use crate::probe::build_health_url;

/// Print the readiness URL for a provider, as configured.
pub fn run_health_url(env: &CommandEnv, provider_id: &str, out: &mut impl Write) -> Result<()> {
    let provider = env
        .config
        .provider(provider_id)
        .with_context(|| format!("provider not found: {}", provider_id))?;
    let url = build_health_url(&provider)
        .with_context(|| format!("Cannot build health URL for {}", provider_id))?;
    writeln!(out, "{}", url)?;
    Ok(())
}
