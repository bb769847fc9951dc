//! larder: incremental recipe harvesting into SQLite
//!
//! Discovery walks the catalog's listing pages and records recipe links;
//! ingestion fetches each link once, normalizes genres and tags into lookup
//! tables referenced from numbered slot columns, and stores a JPEG that fits a
//! fixed byte ceiling.

pub mod commands;
pub mod compress;
pub mod config;
pub mod crawl;
pub mod error;
pub mod pacing;
pub mod parse;
pub mod progress;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
