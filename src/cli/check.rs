//! CLI `check` command: validate `holo.json` and report every problem.

use anyhow::{bail, Result};
use std::path::Path;

use holo::config::{ConfigError, HoloConfig};

pub fn check(dir: &Path) -> Result<()> {
    let config = match HoloConfig::load(dir) {
        Ok(config) => config,
        Err(ConfigError::NotFound(path)) => {
            bail!("holo.json not found at {}. Run `holo setup` to create it.", path.display())
        }
        Err(e) => return Err(e.into()),
    };

    match config.validate() {
        Ok(()) => {
            println!("holo.json is valid");
            Ok(())
        }
        Err(ConfigError::Invalid(issues)) => {
            println!("holo.json has {} problem(s):", issues.len());
            for issue in &issues {
                println!("  - {issue}");
            }
            bail!("invalid holo.json")
        }
        Err(e) => Err(e.into()),
    }
}
