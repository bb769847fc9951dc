//! Configuration management for larder
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::compress::CompressionSettings;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog location and page selectors
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Delays between records
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Image compression parameters
    #[serde(default)]
    pub image: ImageConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Listing page URL template containing `{page}`
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// First listing page visited by discovery
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Last listing page visited by discovery (inclusive)
    #[serde(default = "default_page_bound")]
    pub page_bound: u32,

    /// Separator between genres in the genre field
    #[serde(default = "default_genre_separator")]
    pub genre_separator: String,

    /// CSS selectors used by the HTML page reader
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// CSS selectors for listing cards and recipe fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_card_selector")]
    pub card: String,

    #[serde(default = "default_card_title_selector")]
    pub card_title: String,

    /// Anchor inside a card; its `href` is the recipe link
    #[serde(default = "default_card_link_selector")]
    pub card_link: String,

    #[serde(default = "default_name_selector")]
    pub name: String,

    #[serde(default = "default_author_selector")]
    pub author: String,

    #[serde(default = "default_genre_selector")]
    pub genre: String,

    #[serde(default = "default_prepare_time_selector")]
    pub prepare_time: String,

    #[serde(default = "default_person_num_selector")]
    pub person_num: String,

    /// Matches every ingredient element
    #[serde(default = "default_ingredient_selector")]
    pub ingredient: String,

    /// Matches every tag element
    #[serde(default = "default_tag_selector")]
    pub tag: String,

    /// Image element; its `src` is the image URL
    #[serde(default = "default_image_selector")]
    pub image: String,
}

/// HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Requests per second across all hosts
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Cookies sent with every request
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

/// Pacing between records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,

    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// Committed records between long pauses
    #[serde(default = "default_long_pause_every")]
    pub long_pause_every: u32,

    #[serde(default = "default_long_pause_ms")]
    pub long_pause_ms: u64,
}

/// Image compression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_start_quality")]
    pub start_quality: u8,

    #[serde(default = "default_floor_quality")]
    pub floor_quality: u8,

    #[serde(default = "default_quality_step")]
    pub step: u8,

    /// Maximum stored image size in bytes
    #[serde(default = "default_ceiling_bytes")]
    pub ceiling_bytes: usize,
}

impl ImageConfig {
    pub fn compression_settings(&self) -> CompressionSettings {
        CompressionSettings {
            start_quality: self.start_quality,
            floor_quality: self.floor_quality,
            step: self.step,
            ceiling_bytes: self.ceiling_bytes,
        }
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for larder data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            start_page: default_start_page(),
            page_bound: default_page_bound(),
            selectors: SelectorConfig::default(),
            genre_separator: default_genre_separator(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: default_card_selector(),
            card_title: default_card_title_selector(),
            card_link: default_card_link_selector(),
            name: default_name_selector(),
            author: default_author_selector(),
            genre: default_genre_selector(),
            prepare_time: default_prepare_time_selector(),
            person_num: default_person_num_selector(),
            ingredient: default_ingredient_selector(),
            tag: default_tag_selector(),
            image: default_image_selector(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_http_timeout(),
            requests_per_second: default_requests_per_second(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            long_pause_every: default_long_pause_every(),
            long_pause_ms: default_long_pause_ms(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            start_quality: default_start_quality(),
            floor_quality: default_floor_quality(),
            step: default_quality_step(),
            ceiling_bytes: default_ceiling_bytes(),
        }
    }
}

impl Config {
    /// Get the default base directory for larder (~/.larder)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".larder")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("larder.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("larder.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.catalog.listing_url.contains("{page}") {
            return Err(Error::Config(
                "catalog.listing_url must contain a {page} placeholder".to_string(),
            ));
        }

        if self.catalog.page_bound < self.catalog.start_page {
            return Err(Error::Config(
                "catalog.page_bound must be >= catalog.start_page".to_string(),
            ));
        }

        if self.catalog.genre_separator.is_empty() {
            return Err(Error::Config(
                "catalog.genre_separator must not be empty".to_string(),
            ));
        }

        if self.http.requests_per_second == 0 {
            return Err(Error::Config(
                "http.requests_per_second must be positive".to_string(),
            ));
        }

        if self.pacing.jitter_min_ms > self.pacing.jitter_max_ms {
            return Err(Error::Config(
                "pacing.jitter_min_ms must be <= pacing.jitter_max_ms".to_string(),
            ));
        }

        if self.pacing.long_pause_every == 0 {
            return Err(Error::Config(
                "pacing.long_pause_every must be positive".to_string(),
            ));
        }

        self.image.compression_settings().validate()?;

        Ok(())
    }
}
