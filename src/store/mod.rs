//! Recipe storage using SQLite
//!
//! This module handles all persistent state:
//! - Locators (`menu_links`, written by discovery)
//! - Recipes (`menu_info`, with runtime-added slot columns)
//! - Label tables (`genre`, `tags`)
//! - Ingest run history

mod lookup;
mod schema;
mod slots;

pub use lookup::*;
pub use schema::*;
pub use slots::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqliteConnection, Transaction};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Kind of label normalized into its own table and slot columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Genre,
    Tag,
}

impl LabelKind {
    pub const ALL: [LabelKind; 2] = [LabelKind::Genre, LabelKind::Tag];

    /// Label table
    pub fn table(self) -> &'static str {
        match self {
            LabelKind::Genre => "genre",
            LabelKind::Tag => "tags",
        }
    }

    /// Slot column prefix on the recipe table
    pub fn slot_prefix(self) -> &'static str {
        match self {
            LabelKind::Genre => "genre_id_",
            LabelKind::Tag => "tag_id_",
        }
    }
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelKind::Genre => write!(f, "genre"),
            LabelKind::Tag => write!(f, "tag"),
        }
    }
}

/// Ingest run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(Error::Config(format!("Unknown run status: {}", s))),
        }
    }
}

/// A discovered locator
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MenuLink {
    pub id: i64,
    pub title: String,
    pub link: String,
}

/// Scalar fields of a recipe as inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub name: String,
    pub author: String,
    pub prepare_time: String,
    pub person_num: String,
    pub ingredients: String,
}

/// Base columns of a stored recipe (slot columns are read separately)
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub name: String,
    pub author: Option<String>,
    pub prepare_time: Option<String>,
    pub person_num: Option<String>,
    pub ingredients: Option<String>,
    pub image: Option<Vec<u8>>,
}

/// An ingest run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IngestRun {
    pub id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub overwrite: bool,
    pub processed: i64,
    pub skipped: i64,
    pub failed: i64,
    pub errors_json: Option<String>,
}

impl IngestRun {
    pub fn new(overwrite: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            overwrite,
            processed: 0,
            skipped: 0,
            failed: 0,
            errors_json: None,
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default()
    }
}

/// Store handle
#[derive(Clone)]
pub struct RecipeStore {
    pool: SqlitePool,
}

impl RecipeStore {
    /// Connect to the database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Open (creating if missing) the database at `db_path` without initializing it
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Open the database at `db_path` and make sure every table exists
    pub async fn new(db_path: &Path) -> Result<Self> {
        let store = Self::open(db_path).await?;
        store.init_schema().await?;
        Ok(store)
    }

    /// Create all tables that do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        debug!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        sqlx::query(RECIPE_SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if the database has been initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='menu_links'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    /// Drop and recreate the recipe and label tables, slot columns included
    pub async fn reset_recipe_tables(&self) -> Result<()> {
        warn!("Dropping tables: menu_info, genre, tags");
        sqlx::query(DROP_RECIPE_SCHEMA_SQL).execute(&self.pool).await?;
        sqlx::query(RECIPE_SCHEMA_SQL).execute(&self.pool).await?;
        info!("Recreated recipe tables");
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===== Locator Operations =====

    /// Insert a locator; an existing link keeps its row and title
    pub async fn upsert_link(&self, title: &str, link: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO menu_links (title, link)
            VALUES (?, ?)
            ON CONFLICT(link) DO UPDATE SET link = excluded.link
            "#,
        )
        .bind(title)
        .bind(link)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All locators in discovery order
    pub async fn list_links(&self) -> Result<Vec<MenuLink>> {
        let links =
            sqlx::query_as::<_, MenuLink>("SELECT id, title, link FROM menu_links ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(links)
    }

    pub async fn count_links(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM menu_links")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ===== Recipe Operations =====

    pub async fn recipe_exists(&self, name: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM menu_info WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_recipe(&self, name: &str) -> Result<Option<RecipeRow>> {
        let recipe = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, name, author, prepare_time, person_num, ingredients, image
            FROM menu_info WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(recipe)
    }

    /// Label ids held in a recipe's slot columns, in slot order
    pub async fn recipe_slot_ids(&self, name: &str, kind: LabelKind) -> Result<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        read_slots(
            &mut conn,
            RECIPE_TABLE,
            kind.slot_prefix(),
            RECIPE_IDENTITY_COLUMN,
            name,
        )
        .await
    }

    /// Names for label ids, preserving the order of `ids`
    pub async fn label_names(&self, kind: LabelKind, ids: &[i64]) -> Result<Vec<String>> {
        let sql = format!("SELECT name FROM {} WHERE id = ?", quote_ident(kind.table())?);
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            let name: Option<String> = sqlx::query_scalar(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            match name {
                Some(name) => names.push(name),
                None => warn!("Dangling {} id {} in slot column", kind, id),
            }
        }
        Ok(names)
    }

    pub async fn count_labels(&self, kind: LabelKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(kind.table())?);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Number of provisioned slot columns for `kind`
    pub async fn slot_column_count(&self, kind: LabelKind) -> Result<usize> {
        let mut conn = self.pool.acquire().await?;
        let slots = existing_slots(&mut conn, RECIPE_TABLE, kind.slot_prefix()).await?;
        Ok(slots.len())
    }

    // ===== Ingest Run Operations =====

    pub async fn start_ingest_run(&self, overwrite: bool) -> Result<IngestRun> {
        let run = IngestRun::new(overwrite);
        sqlx::query(
            r#"
            INSERT INTO ingest_runs (id, started_at, status, overwrite, processed, skipped, failed)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.started_at)
        .bind(&run.status)
        .bind(run.overwrite)
        .bind(run.processed)
        .bind(run.skipped)
        .bind(run.failed)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    pub async fn complete_ingest_run(
        &self,
        id: &str,
        status: RunStatus,
        processed: i64,
        skipped: i64,
        failed: i64,
        errors: &[String],
    ) -> Result<()> {
        let errors_json = if errors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(errors)?)
        };
        sqlx::query(
            r#"
            UPDATE ingest_runs SET
                completed_at = ?,
                status = ?,
                processed = ?,
                skipped = ?,
                failed = ?,
                errors_json = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(processed)
        .bind(skipped)
        .bind(failed)
        .bind(errors_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn latest_run(&self) -> Result<Option<IngestRun>> {
        let run = sqlx::query_as::<_, IngestRun>(
            "SELECT * FROM ingest_runs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    // ===== Statistics =====

    pub async fn get_stats(&self) -> Result<StoreStats> {
        let recipes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM menu_info")
            .fetch_one(&self.pool)
            .await?;
        let recipes_with_image: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM menu_info WHERE image IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            link_count: self.count_links().await?,
            recipe_count: recipes,
            recipes_with_image,
            genre_count: self.count_labels(LabelKind::Genre).await?,
            tag_count: self.count_labels(LabelKind::Tag).await?,
            genre_slots: self.slot_column_count(LabelKind::Genre).await?,
            tag_slots: self.slot_column_count(LabelKind::Tag).await?,
        })
    }
}

/// Insert the scalar fields of one recipe, returning its row id
pub async fn insert_recipe(conn: &mut SqliteConnection, recipe: &NewRecipe) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO menu_info (name, author, prepare_time, person_num, ingredients)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&recipe.name)
    .bind(&recipe.author)
    .bind(&recipe.prepare_time)
    .bind(&recipe.person_num)
    .bind(&recipe.ingredients)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn set_recipe_image(conn: &mut SqliteConnection, name: &str, image: &[u8]) -> Result<()> {
    sqlx::query("UPDATE menu_info SET image = ? WHERE name = ?")
        .bind(image)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Quote a table or column name after checking it is a plain identifier.
///
/// Names are interpolated into SQL, so anything outside `[A-Za-z_][A-Za-z0-9_]*`
/// is rejected.
pub fn quote_ident(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// Store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub link_count: i64,
    pub recipe_count: i64,
    pub recipes_with_image: i64,
    pub genre_count: i64,
    pub tag_count: i64,
    pub genre_slots: usize,
    pub tag_slots: usize,
}
