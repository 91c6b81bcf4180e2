use anyhow::{Context, Result};
use std::path::PathBuf;

/// Find the git root directory by searching upward from current directory.
pub fn find_git_root() -> Option<PathBuf> {
    let current = std::env::current_dir().ok()?;
    let mut path = current.as_path();

    loop {
        if path.join(".git").exists() {
            return Some(path.to_path_buf());
        }
        path = path.parent()?;
    }
}

/// Resolve the project root that startup commands run in.
pub fn resolve_working_dir(cwd: Option<String>) -> Result<PathBuf> {
    if let Some(path) = cwd {
        return PathBuf::from(&path)
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize provided working directory: {}", path));
    }

    match find_git_root() {
        Some(root) => Ok(root),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}
