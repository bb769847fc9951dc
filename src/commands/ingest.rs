//! Ingest command implementation

use crate::compress::{compress, CompressedImage, CompressionSettings};
use crate::config::Config;
use crate::crawl::PageReader;
use crate::error::{Error, Result};
use crate::pacing::Pacer;
use crate::parse::RecipeFields;
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::store::{
    assign_slots, ensure_slots, insert_recipe, resolve, set_recipe_image, LabelKind, MenuLink,
    NewRecipe, RecipeStore, RunStatus, INGREDIENT_SEPARATOR, LABEL_NAME_COLUMN,
    RECIPE_IDENTITY_COLUMN, RECIPE_TABLE,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

/// Options for one ingest run
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Drop and rebuild recipe and label tables, re-ingesting every locator
    pub overwrite: bool,
    /// Only process the first N locators
    pub limit: Option<usize>,
}

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub run_id: String,
    pub processed: i64,
    pub skipped: i64,
    pub failed: i64,
    pub images_stored: i64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Committed { image_stored: bool },
    /// Already ingested; `fetched` tells whether the page was requested first
    Skipped { fetched: bool },
}

/// Ingest every discovered locator, in discovery order.
///
/// Failures are isolated per record. Only losing the store connection stops
/// the run, in which case the run is recorded as failed and the error returned.
pub async fn cmd_ingest(
    config: &Config,
    store: &RecipeStore,
    reader: &dyn PageReader,
    options: IngestOptions,
) -> Result<IngestStats> {
    if options.overwrite {
        store.reset_recipe_tables().await?;
    }

    let run = store.start_ingest_run(options.overwrite).await?;
    let mut stats = IngestStats {
        run_id: run.id.clone(),
        ..IngestStats::default()
    };

    let mut links = store.list_links().await?;
    if let Some(limit) = options.limit {
        links.truncate(limit);
    }
    info!(
        "Ingesting {} locators (overwrite: {})",
        links.len(),
        options.overwrite
    );

    let settings = config.image.compression_settings();
    let mut pacer = Pacer::new(config.pacing.clone());
    let progress = start_progress_bar(links.len(), "Ingesting recipes");
    let last = links.len().saturating_sub(1);

    for (idx, locator) in links.iter().enumerate() {
        let pause = match ingest_record(store, reader, &settings, locator, options.overwrite).await
        {
            Ok(RecordOutcome::Committed { image_stored }) => {
                stats.processed += 1;
                if image_stored {
                    stats.images_stored += 1;
                }
                info!(link = %locator.link, "Process ended, count: {}", stats.processed);
                Some(pacer.record_committed())
            }
            Ok(RecordOutcome::Skipped { fetched }) => {
                stats.skipped += 1;
                info!(link = %locator.link, "Skipped, already ingested");
                fetched.then(|| pacer.record_skipped())
            }
            Err(e) if e.is_fatal() => {
                error!(link = %locator.link, "Store connection lost: {}", e);
                stats.failed += 1;
                stats.errors.push(format!("{}: {}", locator.link, e));
                finish_progress(progress, "Aborted");
                if let Err(complete_err) = store
                    .complete_ingest_run(
                        &run.id,
                        RunStatus::Failed,
                        stats.processed,
                        stats.skipped,
                        stats.failed,
                        &stats.errors,
                    )
                    .await
                {
                    warn!("Could not record failed run {}: {}", run.id, complete_err);
                }
                return Err(e);
            }
            Err(e) => {
                let error_msg = format!("{}: {}", locator.link, e);
                warn!(kind = e.kind(), "Record failed: {}", error_msg);
                stats.errors.push(error_msg);
                stats.failed += 1;
                Some(pacer.record_skipped())
            }
        };

        advance_progress(&progress, &locator.title);

        if idx < last {
            if let Some(pause) = pause {
                pause.sleep().await;
            }
        }
    }

    finish_progress(progress, "Recipes ingested");

    store
        .complete_ingest_run(
            &run.id,
            RunStatus::Completed,
            stats.processed,
            stats.skipped,
            stats.failed,
            &stats.errors,
        )
        .await?;

    info!(
        "Ingestion complete: {} committed, {} skipped, {} failed",
        stats.processed, stats.skipped, stats.failed
    );

    Ok(stats)
}

async fn ingest_record(
    store: &RecipeStore,
    reader: &dyn PageReader,
    settings: &CompressionSettings,
    locator: &MenuLink,
    overwrite: bool,
) -> Result<RecordOutcome> {
    if !overwrite && store.recipe_exists(&locator.title).await? {
        return Ok(RecordOutcome::Skipped { fetched: false });
    }

    debug!("Fetching recipe: {}", locator.link);
    let fields = reader.fetch_record_fields(&locator.link).await?;

    if !overwrite && store.recipe_exists(&fields.name).await? {
        return Ok(RecordOutcome::Skipped { fetched: true });
    }

    let image = match &fields.image_url {
        Some(url) => load_image(reader, settings, &fields.name, url).await,
        None => {
            warn!("No image for {}", fields.name);
            None
        }
    };

    let mut tx = store.begin().await?;

    insert_recipe(
        &mut tx,
        &NewRecipe {
            name: fields.name.clone(),
            author: fields.author.clone(),
            prepare_time: fields.prepare_time.clone(),
            person_num: fields.person_num.clone(),
            ingredients: fields.ingredients.join(INGREDIENT_SEPARATOR),
        },
    )
    .await?;

    for kind in LabelKind::ALL {
        normalize_labels(&mut tx, kind, &fields.name, labels_of(&fields, kind)).await?;
    }

    if let Some(image) = &image {
        set_recipe_image(&mut tx, &fields.name, &image.data).await?;
    }

    tx.commit().await?;

    Ok(RecordOutcome::Committed {
        image_stored: image.is_some(),
    })
}

fn labels_of(fields: &RecipeFields, kind: LabelKind) -> &[String] {
    match kind {
        LabelKind::Genre => &fields.genre,
        LabelKind::Tag => &fields.tags,
    }
}

/// Resolve each label to its id, widen the slot series and fill it in label order
async fn normalize_labels(
    conn: &mut SqliteConnection,
    kind: LabelKind,
    recipe_name: &str,
    labels: &[String],
) -> Result<()> {
    if labels.is_empty() {
        return Ok(());
    }

    let mut ids = Vec::with_capacity(labels.len());
    for label in labels {
        ids.push(resolve(&mut *conn, kind.table(), LABEL_NAME_COLUMN, label).await?);
    }

    ensure_slots(&mut *conn, RECIPE_TABLE, kind.slot_prefix(), ids.len()).await?;
    assign_slots(
        &mut *conn,
        RECIPE_TABLE,
        kind.slot_prefix(),
        RECIPE_IDENTITY_COLUMN,
        recipe_name,
        &ids,
    )
    .await
}

/// Fetch and compress an image. Failures leave the recipe without one.
async fn load_image(
    reader: &dyn PageReader,
    settings: &CompressionSettings,
    recipe_name: &str,
    url: &str,
) -> Option<CompressedImage> {
    let raw = match reader.fetch_image(url).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to retrieve image for {}: {}", recipe_name, e);
            return None;
        }
    };

    // JPEG re-encoding is CPU bound, so run it off the async workers
    let settings = *settings;
    let compressed = tokio::task::spawn_blocking(move || compress(&raw, &settings))
        .await
        .map_err(|e| Error::ImageCompression(format!("Task join error: {}", e)))
        .and_then(|result| result);

    match compressed {
        Ok(image) => {
            debug!(
                "Compressed image for {} to {} bytes at quality {} ({} attempts)",
                recipe_name,
                image.data.len(),
                image.quality,
                image.attempts
            );
            Some(image)
        }
        Err(e) => {
            warn!("Storing {} without image: {}", recipe_name, e);
            None
        }
    }
}

/// Print ingestion results to console
pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\nIngestion finished (run {})\n", stats.run_id);
    println!("  Committed:     {}", stats.processed);
    println!("  With image:    {}", stats.images_stored);
    println!("  Skipped:       {}", stats.skipped);
    println!("  Failed:        {}", stats.failed);
    for error in &stats.errors {
        println!("  ✗ {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fake::{fields, png_bytes, quiet_config, FakeReader};
    use crate::store::test_support::setup_test_store;
    use std::time::{Duration, Instant};

    async fn seed_links(store: &RecipeStore, links: &[(&str, &str)]) {
        for (title, link) in links {
            store.upsert_link(title, link).await.unwrap();
        }
    }

    fn three_locator_reader() -> FakeReader {
        let mut reader = FakeReader::default();
        reader.records.insert(
            "https://x/r/1".to_string(),
            Some(fields("Pasta Pesto", &["Vegetarisch", "Hoofdgerecht"], &["Snel"], None)),
        );
        reader.records.insert("https://x/r/2".to_string(), None);
        reader.records.insert(
            "https://x/r/3".to_string(),
            Some(fields("Tomatensoep", &["Voorgerecht"], &["Snel", "Makkelijk", "Goedkoop"], None)),
        );
        reader
    }

    async fn seed_three(store: &RecipeStore) {
        seed_links(
            store,
            &[
                ("Pasta Pesto", "https://x/r/1"),
                ("Kapotte pagina", "https://x/r/2"),
                ("Tomatensoep", "https://x/r/3"),
            ],
        )
        .await;
    }

    #[tokio::test]
    async fn test_failed_record_is_isolated() {
        let (store, _tmp) = setup_test_store().await;
        seed_three(&store).await;
        let reader = three_locator_reader();

        let stats = cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("https://x/r/2"));
        assert_eq!(store.get_stats().await.unwrap().recipe_count, 2);

        let run = store.latest_run().await.unwrap().unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.processed, 2);
        assert!(run.errors()[0].contains("https://x/r/2"));
    }

    #[tokio::test]
    async fn test_second_run_is_all_skips() {
        let (store, _tmp) = setup_test_store().await;
        seed_three(&store).await;
        let reader = three_locator_reader();

        cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();
        let before = store.get_stats().await.unwrap();
        let fetched_before = reader.fetched().len();

        let stats = cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();
        let after = store.get_stats().await.unwrap();

        assert_eq!(stats.processed, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(after.recipe_count, before.recipe_count);
        assert_eq!(after.genre_count, before.genre_count);
        // Known titles are skipped without fetching; only the broken page is retried
        assert_eq!(reader.fetched().len() - fetched_before, 1);
    }

    #[tokio::test]
    async fn test_skip_by_extracted_name() {
        let (store, _tmp) = setup_test_store().await;
        seed_links(&store, &[("Pasta", "https://x/r/a"), ("Pasta (2)", "https://x/r/b")]).await;
        let mut reader = FakeReader::default();
        reader
            .records
            .insert("https://x/r/a".to_string(), Some(fields("Pasta Pesto", &[], &[], None)));
        reader
            .records
            .insert("https://x/r/b".to_string(), Some(fields("Pasta Pesto", &[], &[], None)));

        let stats = cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(reader.fetched().len(), 2);
    }

    #[tokio::test]
    async fn test_labels_fill_slot_columns() {
        let (store, _tmp) = setup_test_store().await;
        seed_three(&store).await;
        let reader = three_locator_reader();

        cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.genre_count, 3);
        assert_eq!(stats.tag_count, 3);
        assert_eq!(stats.genre_slots, 2);
        assert_eq!(stats.tag_slots, 3);

        let genre_ids = store.recipe_slot_ids("Pasta Pesto", LabelKind::Genre).await.unwrap();
        assert_eq!(
            store.label_names(LabelKind::Genre, &genre_ids).await.unwrap(),
            vec!["Vegetarisch", "Hoofdgerecht"]
        );
        // "Snel" resolves to the same tag id for both recipes
        let pasta_tags = store.recipe_slot_ids("Pasta Pesto", LabelKind::Tag).await.unwrap();
        let soep_tags = store.recipe_slot_ids("Tomatensoep", LabelKind::Tag).await.unwrap();
        assert_eq!(pasta_tags[0], soep_tags[0]);
        assert_eq!(soep_tags.len(), 3);

        let recipe = store.get_recipe("Pasta Pesto").await.unwrap().unwrap();
        assert_eq!(recipe.ingredients.as_deref(), Some("200 g pasta; 1 ui"));
        assert!(recipe.image.is_none());
    }

    #[tokio::test]
    async fn test_image_is_compressed_and_stored() {
        let (store, _tmp) = setup_test_store().await;
        seed_links(&store, &[("Pasta Pesto", "https://x/r/1")]).await;
        let mut reader = FakeReader::default();
        reader.records.insert(
            "https://x/r/1".to_string(),
            Some(fields("Pasta Pesto", &["Vegetarisch"], &[], Some("https://x/img/1.png"))),
        );
        reader
            .images
            .insert("https://x/img/1.png".to_string(), png_bytes());

        let stats = cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.images_stored, 1);
        let image = store.get_recipe("Pasta Pesto").await.unwrap().unwrap().image.unwrap();
        assert!(image.len() <= 65535);
        assert_eq!(&image[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_image_failures_keep_record() {
        let (store, _tmp) = setup_test_store().await;
        seed_links(&store, &[("Soep", "https://x/r/1"), ("Taart", "https://x/r/2")]).await;
        let mut reader = FakeReader::default();
        reader.records.insert(
            "https://x/r/1".to_string(),
            Some(fields("Soep", &[], &[], Some("https://x/img/missing.png"))),
        );
        reader.records.insert(
            "https://x/r/2".to_string(),
            Some(fields("Taart", &[], &[], Some("https://x/img/big.png"))),
        );
        reader
            .images
            .insert("https://x/img/big.png".to_string(), png_bytes());

        let mut config = quiet_config();
        config.image.ceiling_bytes = 64;

        let stats = cmd_ingest(&config, &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.images_stored, 0);
        assert_eq!(store.get_stats().await.unwrap().recipes_with_image, 0);
    }

    #[tokio::test]
    async fn test_overwrite_rebuilds_tables() {
        let (store, _tmp) = setup_test_store().await;
        seed_three(&store).await;
        let reader = three_locator_reader();

        cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();
        let stats = cmd_ingest(
            &quiet_config(),
            &store,
            &reader,
            IngestOptions {
                overwrite: true,
                limit: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.skipped, 0);
        let store_stats = store.get_stats().await.unwrap();
        assert_eq!(store_stats.recipe_count, 2);
        assert_eq!(store_stats.genre_count, 3);
        assert_eq!(store_stats.link_count, 3);
    }

    #[tokio::test]
    async fn test_limit_caps_locators() {
        let (store, _tmp) = setup_test_store().await;
        seed_three(&store).await;
        let reader = three_locator_reader();

        let stats = cmd_ingest(
            &quiet_config(),
            &store,
            &reader,
            IngestOptions {
                overwrite: false,
                limit: Some(1),
            },
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(reader.fetched(), vec!["https://x/r/1".to_string()]);
    }

    #[tokio::test]
    async fn test_lost_connection_aborts_run() {
        let (store, _tmp) = setup_test_store().await;
        seed_three(&store).await;
        let mut reader = three_locator_reader();
        reader.close_on = Some(("https://x/r/3".to_string(), store.clone()));

        let err = cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn test_slot_column_limit_fails_only_that_record() {
        let (store, _tmp) = setup_test_store().await;
        seed_links(&store, &[("Alles", "https://x/r/1"), ("Soep", "https://x/r/2")]).await;

        // SQLite caps a table at 2000 columns, so this many tag slots cannot be added
        let many: Vec<String> = (0..2100).map(|i| format!("tag {}", i)).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        let mut reader = FakeReader::default();
        reader
            .records
            .insert("https://x/r/1".to_string(), Some(fields("Alles", &[], &many, None)));
        reader
            .records
            .insert("https://x/r/2".to_string(), Some(fields("Soep", &[], &["Snel"], None)));

        let stats = cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.errors[0].starts_with("https://x/r/1"));
        assert!(stats.errors[0].contains("Schema evolution failed"));
        assert!(stats.errors[0].contains("tag_id_"));

        // Labels and columns added for the failed record were rolled back
        let store_stats = store.get_stats().await.unwrap();
        assert_eq!(store_stats.recipe_count, 1);
        assert_eq!(store_stats.tag_count, 1);
        assert_eq!(store_stats.tag_slots, 1);
        assert!(!store.recipe_exists("Alles").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_name_in_overwrite_fails_only_that_record() {
        let (store, _tmp) = setup_test_store().await;
        seed_links(&store, &[("Pasta", "https://x/r/a"), ("Pasta (2)", "https://x/r/b")]).await;
        let mut reader = FakeReader::default();
        for link in ["https://x/r/a", "https://x/r/b"] {
            reader.records.insert(
                link.to_string(),
                Some(fields("Pasta Pesto", &["Vegetarisch"], &[], None)),
            );
        }
        let overwrite = IngestOptions {
            overwrite: true,
            limit: None,
        };

        let stats = cmd_ingest(&quiet_config(), &store, &reader, overwrite.clone())
            .await
            .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.errors[0].starts_with("https://x/r/b"));
        let run = store.latest_run().await.unwrap().unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.failed, 1);

        // The same record again surfaces the unique-name violation as a non-fatal error
        let links = store.list_links().await.unwrap();
        let err = ingest_record(
            &store,
            &reader,
            &CompressionSettings::default(),
            &links[1],
            overwrite.overwrite,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "persistence");
        assert!(!err.is_fatal());
        assert_eq!(store.get_stats().await.unwrap().recipe_count, 1);
    }

    fn long_pause_config(every: u32) -> Config {
        let mut config = quiet_config();
        config.pacing.long_pause_every = every;
        config.pacing.long_pause_ms = 1500;
        config
    }

    async fn seed_numbered(store: &RecipeStore, reader: &mut FakeReader, count: usize) {
        for i in 1..=count {
            let name = format!("Recept {}", i);
            let link = format!("https://x/r/{}", i);
            store.upsert_link(&name, &link).await.unwrap();
            reader.records.insert(link, Some(fields(&name, &[], &[], None)));
        }
    }

    #[tokio::test]
    async fn test_long_pause_taken_after_batch_before_next_record() {
        let (store, _tmp) = setup_test_store().await;
        let mut reader = FakeReader::default();
        seed_numbered(&store, &mut reader, 3).await;

        let start = Instant::now();
        let stats = cmd_ingest(&long_pause_config(2), &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.processed, 3);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_no_long_pause_before_batch_or_after_last_record() {
        let (store, _tmp) = setup_test_store().await;
        let mut reader = FakeReader::default();
        seed_numbered(&store, &mut reader, 3).await;

        // Three commits stay below a batch of four
        let start = Instant::now();
        cmd_ingest(&long_pause_config(4), &store, &reader, IngestOptions::default())
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(1500));

        // A batch completing on the last record has nothing left to wait for
        let (store, _tmp2) = setup_test_store().await;
        let mut reader = FakeReader::default();
        seed_numbered(&store, &mut reader, 2).await;

        let start = Instant::now();
        cmd_ingest(&long_pause_config(2), &store, &reader, IngestOptions::default())
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_skips_without_fetch_do_not_pause() {
        let (store, _tmp) = setup_test_store().await;
        let mut reader = FakeReader::default();
        seed_numbered(&store, &mut reader, 3).await;
        cmd_ingest(&quiet_config(), &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        let mut config = quiet_config();
        config.pacing.jitter_min_ms = 1500;
        config.pacing.jitter_max_ms = 1500;

        let start = Instant::now();
        let stats = cmd_ingest(&config, &store, &reader, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.skipped, 3);
        assert!(start.elapsed() < Duration::from_millis(1500));
    }
}
