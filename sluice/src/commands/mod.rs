//! Command implementations for the CLI.

mod execution;
mod info;
mod init;

use std::path::Path;

use anyhow::{Context, Result};
use sluice_core::BuildConfig;

pub use execution::cmd_run;
pub use info::{cmd_check, cmd_list};
pub use init::cmd_init;

fn load_config(path: &Path) -> Result<BuildConfig> {
    BuildConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}
