use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;

use super::CommandEnv;
use crate::config::ConfigProvider;
use crate::domain::ReadinessSnapshot;
use crate::status::StatusMonitor;

/// Compute and print one readiness snapshot for the active provider.
pub async fn run_status(env: &CommandEnv, json: bool, out: &mut impl Write) -> Result<()> {
    let config: Arc<dyn ConfigProvider> = env.config.clone();
    let monitor = StatusMonitor::new(config, env.supervisor.prober().clone());
    let snapshot = monitor.refresh(&env.cancel).await;

    if json {
        let text = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize status snapshot")?;
        writeln!(out, "{}", text)?;
    } else {
        write_snapshot(out, &snapshot)?;
    }
    Ok(())
}

/// Human-readable rendering shared with `watch`.
pub(super) fn write_snapshot(out: &mut impl Write, snapshot: &ReadinessSnapshot) -> Result<()> {
    let provider = if snapshot.provider_name.is_empty() {
        "active provider"
    } else {
        snapshot.provider_name.as_str()
    };

    if snapshot.ready {
        writeln!(out, "✅ {} is ready", provider)?;
    } else {
        writeln!(out, "❌ {} is not ready: {}", provider, snapshot.detail)?;
    }
    if !snapshot.model_id.is_empty() {
        if snapshot.model_name.is_empty() {
            writeln!(out, "   Model: {}", snapshot.model_id)?;
        } else {
            writeln!(out, "   Model: {} ({})", snapshot.model_id, snapshot.model_name)?;
        }
    }
    if !snapshot.base_url.is_empty() {
        writeln!(out, "   URL: {}", snapshot.base_url)?;
    }
    if !snapshot.provider_id.is_empty() {
        let streaming = if snapshot.stream_enabled {
            "enabled"
        } else {
            "disabled"
        };
        writeln!(out, "   Streaming: {}", streaming)?;
    }
    if let Some(checked) = snapshot.last_checked {
        writeln!(out, "   Checked: {}", checked.to_rfc3339())?;
    }
    Ok(())
}
