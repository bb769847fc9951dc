//! Default values for configuration

/// Default listing page template; `{page}` is replaced with the page number
pub fn default_listing_url() -> String {
    std::env::var("LARDER_LISTING_URL")
        .unwrap_or_else(|_| "https://www.jumbo.com/recepten/zoeken?page={page}".to_string())
}

/// Default first listing page
pub fn default_start_page() -> u32 {
    1
}

/// Default last listing page to visit (inclusive)
pub fn default_page_bound() -> u32 {
    40
}

pub fn default_card_selector() -> String {
    ".jum-card".to_string()
}

pub fn default_card_title_selector() -> String {
    ".title".to_string()
}

pub fn default_card_link_selector() -> String {
    "a.card-recipe-link".to_string()
}

pub fn default_name_selector() -> String {
    ".recipe-header-inner h1.heading.name".to_string()
}

pub fn default_author_selector() -> String {
    ".author-info .author-name".to_string()
}

pub fn default_genre_selector() -> String {
    ".recipe-header-container .info p:nth-child(2)".to_string()
}

/// Genres are listed as one string, e.g. "Hoofdgerecht / Vegetarisch"
pub fn default_genre_separator() -> String {
    "/".to_string()
}

pub fn default_prepare_time_selector() -> String {
    ".recipe-header-container .info p:nth-child(1)".to_string()
}

pub fn default_person_num_selector() -> String {
    ".ingredients-container .portion-size-selector .current-value span".to_string()
}

pub fn default_ingredient_selector() -> String {
    ".ingredients-container li.ingredient".to_string()
}

pub fn default_tag_selector() -> String {
    ".labels-container .secondary".to_string()
}

pub fn default_image_selector() -> String {
    ".recipe-header-container .main-image".to_string()
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("larder/{} (Recipe Harvester)", env!("CARGO_PKG_VERSION"))
}

/// Default request timeout in seconds
pub fn default_http_timeout() -> u64 {
    30
}

/// Default request rate (requests per second, all hosts)
pub fn default_requests_per_second() -> u32 {
    2
}

/// Default: shortest pause between records (1 second)
pub fn default_jitter_min_ms() -> u64 {
    1_000
}

/// Default: longest pause between records (5 seconds)
pub fn default_jitter_max_ms() -> u64 {
    5_000
}

/// Default: take the long pause after every 50 committed records
pub fn default_long_pause_every() -> u32 {
    50
}

/// Default long pause (2 minutes)
pub fn default_long_pause_ms() -> u64 {
    120_000
}

/// Default first JPEG quality tried
pub fn default_start_quality() -> u8 {
    70
}

/// Default quality floor; reaching it means the image does not fit
pub fn default_floor_quality() -> u8 {
    10
}

/// Default quality decrement per attempt
pub fn default_quality_step() -> u8 {
    5
}

/// Default stored image ceiling (65,535 bytes, the capacity of a BLOB column in MySQL)
pub fn default_ceiling_bytes() -> usize {
    65_535
}
