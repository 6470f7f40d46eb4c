use std::path::Path;

use anyhow::{bail, Context, Result};
use sluice_core::STARTER_CONFIG;

use crate::formatting::{print_key_value, print_success};

pub fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        );
    }

    std::fs::write(config_path, STARTER_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    print_success("Created starter configuration");
    print_key_value("File", &config_path.display().to_string());
    println!();
    Ok(())
}
