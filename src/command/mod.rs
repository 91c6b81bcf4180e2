//! CLI subcommands.

mod doctor;
mod ensure;
mod health_url;
mod models;
mod status;
mod watch;

pub use doctor::run_doctor;
pub use ensure::run_ensure;
pub use health_url::run_health_url;
pub use models::run_models;
pub use status::run_status;
pub use watch::run_watch;

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::FileConfig;
use crate::startup::StartupSupervisor;

/// Everything a subcommand needs, built once in `main`.
pub struct CommandEnv {
    pub config: Arc<FileConfig>,
    pub supervisor: StartupSupervisor,
    pub working_dir: PathBuf,
    pub cancel: CancellationToken,
}
