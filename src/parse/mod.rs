//! Field extraction from catalog HTML
//!
//! This module turns raw listing and recipe pages into the plain strings the
//! ingestion pipeline stores. Selectors come from configuration and are
//! compiled once.

mod html;

pub use html::*;

use serde::{Deserialize, Serialize};

/// One card on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCard {
    pub title: String,
    pub link: String,
}

/// Raw fields of one recipe page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeFields {
    pub name: String,
    pub author: String,
    /// Genres in page order
    pub genre: Vec<String>,
    pub prepare_time: String,
    pub person_num: String,
    /// Ingredient lines in page order
    pub ingredients: Vec<String>,
    /// Tags in page order
    pub tags: Vec<String>,
    pub image_url: Option<String>,
}

/// Collapse runs of whitespace (including newlines) into single spaces and trim
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;

    for c in text.chars() {
        if c.is_whitespace() {
            last_was_whitespace = true;
        } else {
            if last_was_whitespace && !result.is_empty() {
                result.push(' ');
            }
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result
}

/// Split a combined genre string ("Hoofdgerecht / Vegetarisch") into trimmed labels
pub fn split_labels(text: &str, separator: &str) -> Vec<String> {
    text.split(separator)
        .map(normalize_whitespace)
        .filter(|label| !label.is_empty())
        .collect()
}
