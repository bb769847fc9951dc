//! Discover command implementation

use crate::config::Config;
use crate::crawl::PageReader;
use crate::error::Result;
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::store::RecipeStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Statistics from a discovery walk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverStats {
    pub pages_read: u32,
    pub pages_failed: u32,
    pub cards_seen: u64,
    /// Locators in the store after the walk
    pub links_total: i64,
    pub errors: Vec<String>,
}

/// Walk listing pages `start_page..=page_bound` and upsert every card.
///
/// `page_bound` overrides the configured bound. A page that cannot be read is
/// logged and skipped; store errors end the walk.
pub async fn cmd_discover(
    config: &Config,
    store: &RecipeStore,
    reader: &dyn PageReader,
    page_bound: Option<u32>,
) -> Result<DiscoverStats> {
    let start = config.catalog.start_page;
    let bound = page_bound.unwrap_or(config.catalog.page_bound);
    info!("Discovering recipe links on pages {}..={}", start, bound);

    let mut stats = DiscoverStats::default();
    let page_count = bound.saturating_sub(start).saturating_add(1);
    let progress = if bound >= start {
        start_progress_bar(page_count as usize, "Reading listing pages")
    } else {
        None
    };

    for page in start..=bound {
        match reader.fetch_listing_page(page).await {
            Ok(cards) => {
                debug!("Page {}: {} cards", page, cards.len());
                for card in &cards {
                    store.upsert_link(&card.title, &card.link).await?;
                }
                stats.pages_read += 1;
                stats.cards_seen += cards.len() as u64;
            }
            Err(e) => {
                let error_msg = format!("page {}: {}", page, e);
                warn!("Failed to read listing {}", error_msg);
                stats.errors.push(error_msg);
                stats.pages_failed += 1;
            }
        }

        advance_progress(&progress, &format!("page {}", page));
    }

    finish_progress(progress, "Listing pages read");

    stats.links_total = store.count_links().await?;
    info!(
        "Discovery complete: {} pages read, {} failed, {} cards, {} links stored",
        stats.pages_read, stats.pages_failed, stats.cards_seen, stats.links_total
    );

    Ok(stats)
}

/// Print discovery results to console
pub fn print_discover_stats(stats: &DiscoverStats) {
    println!("\nDiscovery finished\n");
    println!("  Pages read:   {}", stats.pages_read);
    println!("  Pages failed: {}", stats.pages_failed);
    println!("  Cards seen:   {}", stats.cards_seen);
    println!("  Links stored: {}", stats.links_total);
    for error in &stats.errors {
        println!("  ✗ {}", error);
    }
}
