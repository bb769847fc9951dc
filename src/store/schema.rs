//! SQLite schema definition

/// Tables owned by discovery and run bookkeeping; never dropped by overwrite mode
pub const SCHEMA_SQL: &str = r#"
-- Locators discovered on the listing pages
CREATE TABLE IF NOT EXISTS menu_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE
);

-- Ingest runs: tracking history
CREATE TABLE IF NOT EXISTS ingest_runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    overwrite INTEGER NOT NULL DEFAULT 0,
    processed INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    errors_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_started ON ingest_runs(started_at);
"#;

/// Recipe and label tables. Slot columns (`genre_id_N`, `tag_id_N`) are added
/// at runtime and are not part of the base definition.
pub const RECIPE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS menu_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    author TEXT,
    prepare_time TEXT,
    person_num TEXT,
    ingredients TEXT,
    image BLOB
);

CREATE TABLE IF NOT EXISTS genre (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
"#;

/// Drops everything ingest rebuilds in overwrite mode
pub const DROP_RECIPE_SCHEMA_SQL: &str = r#"
DROP TABLE IF EXISTS menu_info;
DROP TABLE IF EXISTS genre;
DROP TABLE IF EXISTS tags;
"#;

/// Recipe table name
pub const RECIPE_TABLE: &str = "menu_info";

/// Column identifying a recipe for slot updates
pub const RECIPE_IDENTITY_COLUMN: &str = "name";

/// Separator used to join ingredient lines into one column
pub const INGREDIENT_SEPARATOR: &str = "; ";

/// Unique text column of the genre and tag tables
pub const LABEL_NAME_COLUMN: &str = "name";
