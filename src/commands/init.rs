//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::RecipeStore;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub force: bool,
}

/// Write a default config and create the database schema
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(Some(options.base_dir));

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.save()?;

    let store = RecipeStore::new(&config.paths.db_file).await?;
    store.close().await;

    info!("Initialized larder at {}", config.paths.base_dir.display());
    Ok(config)
}
