use anyhow::Result;
use std::io::Write;

use super::CommandEnv;
use crate::config::ConfigProvider;

/// List configured providers, their models, and the current selection.
pub fn run_models(env: &CommandEnv, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Providers:")?;
    for provider in env.config.providers() {
        let status = if provider.disable { " (disabled)" } else { "" };
        writeln!(out, "- {} ({}){}", provider.id, provider.kind.as_str(), status)?;

        let mut models = provider.models.clone();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        for model in models {
            writeln!(out, "  - {} ({})", model.id, model.name)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Current selection:")?;
    for (model_type, selected) in env.config.selections() {
        if selected.model.is_empty() {
            continue;
        }
        writeln!(out, "- {}: {}/{}", model_type, selected.provider, selected.model)?;
    }
    Ok(())
}
