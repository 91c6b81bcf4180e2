use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::info;

use super::status::write_snapshot;
use super::CommandEnv;
use crate::config::ConfigProvider;
use crate::status::StatusMonitor;

/// Run the status monitor in the foreground, printing every update until
/// interrupted.
pub async fn run_watch(env: &CommandEnv, out: &mut impl Write) -> Result<()> {
    let config: Arc<dyn ConfigProvider> = env.config.clone();
    let monitor = Arc::new(StatusMonitor::new(config, env.supervisor.prober().clone()));

    let mut subscription = monitor.subscribe(env.cancel.clone());
    let handle = monitor.spawn(env.cancel.clone());

    while let Some(event) = subscription.recv().await {
        write_snapshot(out, &event.snapshot)?;
        writeln!(out)?;
        out.flush()?;
    }

    handle.await.context("Status monitor task failed")?;
    info!("Stopped watching provider status");
    Ok(())
}
