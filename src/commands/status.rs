//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{IngestRun, RecipeStore, StoreStats};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub listing_url: String,
    pub page_bound: u32,
    pub stats: StoreStats,
    pub latest_run: Option<IngestRun>,
}

/// Get store status
pub async fn cmd_status(config: &Config, store: &RecipeStore) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        listing_url: config.catalog.listing_url.clone(),
        page_bound: config.catalog.page_bound,
        stats: store.get_stats().await?,
        latest_run: store.latest_run().await?,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 larder Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Catalog: {} (pages up to {})", status.listing_url, status.page_bound);

    let stats = &status.stats;
    println!("\nStore:");
    println!("  Links: {}", stats.link_count);
    println!(
        "  Recipes: {} ({} with image)",
        stats.recipe_count, stats.recipes_with_image
    );
    println!("  Genres: {} ({} slot columns)", stats.genre_count, stats.genre_slots);
    println!("  Tags: {} ({} slot columns)", stats.tag_count, stats.tag_slots);

    match &status.latest_run {
        Some(run) => {
            println!("\nLatest ingest run: {}", run.id);
            println!("  Started: {}", run.started_at);
            println!(
                "  Completed: {}",
                run.completed_at.as_deref().unwrap_or("-")
            );
            println!("  Status: {}", run.status);
            println!(
                "  Committed: {}, Skipped: {}, Failed: {}",
                run.processed, run.skipped, run.failed
            );
        }
        None => println!("\nNo ingest runs yet. Use 'larder ingest' after 'larder discover'."),
    }
}
