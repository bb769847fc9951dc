//! CLI commands implementation

pub mod discover;
pub mod ingest;
pub mod init;
pub mod show;
pub mod status;

pub use discover::*;
pub use ingest::*;
pub use init::*;
pub use show::*;
pub use status::*;

#[cfg(test)]
pub(crate) mod fake {
    use crate::config::{Config, PacingConfig};
    use crate::crawl::PageReader;
    use crate::error::{Error, Result};
    use crate::parse::{ListingCard, RecipeFields};
    use crate::store::RecipeStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// In-memory page reader
    #[derive(Default)]
    pub struct FakeReader {
        pub listings: HashMap<u32, Vec<ListingCard>>,
        /// `None` makes the link fail extraction
        pub records: HashMap<String, Option<RecipeFields>>,
        pub images: HashMap<String, Vec<u8>>,
        /// Close this store when the link is fetched
        pub close_on: Option<(String, RecipeStore)>,
        pub fetched: Mutex<Vec<String>>,
    }

    impl FakeReader {
        pub fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageReader for FakeReader {
        async fn fetch_listing_page(&self, page: u32) -> Result<Vec<ListingCard>> {
            self.listings
                .get(&page)
                .cloned()
                .ok_or_else(|| Error::Other(format!("HTTP 500 for listing page {}", page)))
        }

        async fn fetch_record_fields(&self, link: &str) -> Result<RecipeFields> {
            self.fetched.lock().unwrap().push(link.to_string());
            if let Some((close_link, store)) = &self.close_on {
                if close_link == link {
                    store.close().await;
                }
            }
            match self.records.get(link) {
                Some(Some(fields)) => Ok(fields.clone()),
                _ => Err(Error::extraction(link, "missing name element")),
            }
        }

        async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
            self.images.get(url).cloned().ok_or_else(|| Error::ImageFetch {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
        }
    }

    pub fn fields(name: &str, genre: &[&str], tags: &[&str], image_url: Option<&str>) -> RecipeFields {
        RecipeFields {
            name: name.to_string(),
            author: "Jumbo".to_string(),
            genre: genre.iter().map(|s| s.to_string()).collect(),
            prepare_time: "30 min".to_string(),
            person_num: "4".to_string(),
            ingredients: vec!["200 g pasta".to_string(), "1 ui".to_string()],
            tags: tags.iter().map(|s| s.to_string()).collect(),
            image_url: image_url.map(str::to_string),
        }
    }

    /// A small PNG
    pub fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([x as u8 * 8, y as u8 * 8, 90]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Default config with pacing disabled
    pub fn quiet_config() -> Config {
        Config {
            pacing: PacingConfig {
                jitter_min_ms: 0,
                jitter_max_ms: 0,
                long_pause_every: 50,
                long_pause_ms: 0,
            },
            ..Config::default()
        }
    }
}
