//! Render command - print the configuration with all shell operators evaluated

use havener_core::{Config, ShellRunner};
use std::path::Path;

use crate::error::{CliError, Result};

/// Run the render command
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path).map_err(CliError::config_load)?;
    let rendered = config.render(&ShellRunner::new())?;

    print!("{}", rendered.to_yaml()?);
    Ok(())
}
