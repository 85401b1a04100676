//! CLI `dev` command: preflight the project in the current directory, then serve it.

use anyhow::{bail, Result};
use std::path::Path;

use holo::config::{HoloConfig, ServerConfig};

use super::env_file::{self, ENV_FILE_NAME};

pub async fn dev(dir: &Path, mut settings: ServerConfig) -> Result<()> {
    let config = match HoloConfig::load_validated(dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            bail!("fix holo.json (or run `holo setup`) before starting the dev server");
        }
    };

    let required = env_file::required_env_vars(Some(&config));
    let file_vars = env_file::read_env_file(dir)?;
    let missing = env_file::missing_env_vars(&required, &file_vars, |k| std::env::var(k).ok());
    if !missing.is_empty() {
        eprintln!("Missing required environment variables in .env:");
        for var in &missing {
            eprintln!("  - {var}");
        }
        bail!("run `holo setup` to configure your environment");
    }

    let env_path = dir.join(ENV_FILE_NAME);
    if env_path.exists() {
        dotenvy::from_path(&env_path)?;
    }

    settings.config_dir = dir.to_path_buf();
    tracing::info!(config_dir = %dir.display(), site = %config.name, "starting dev server");
    println!("Serving {} at http://{}", config.name, settings.bind_addr());
    holo::server::serve(settings).await
}
