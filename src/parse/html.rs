//! HTML selection for listing cards and recipe fields

use super::{normalize_whitespace, split_labels, ListingCard, RecipeFields};
use crate::config::SelectorConfig;
use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Selectors compiled from [`SelectorConfig`]
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    card: Selector,
    card_title: Selector,
    card_link: Selector,
    name: Selector,
    author: Selector,
    genre: Selector,
    prepare_time: Selector,
    person_num: Selector,
    ingredient: Selector,
    tag: Selector,
    image: Selector,
}

fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        Error::Config(format!("Invalid selector for {}: {:?}: {}", field, css, e))
    })
}

impl CompiledSelectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            card: compile("card", &config.card)?,
            card_title: compile("card_title", &config.card_title)?,
            card_link: compile("card_link", &config.card_link)?,
            name: compile("name", &config.name)?,
            author: compile("author", &config.author)?,
            genre: compile("genre", &config.genre)?,
            prepare_time: compile("prepare_time", &config.prepare_time)?,
            person_num: compile("person_num", &config.person_num)?,
            ingredient: compile("ingredient", &config.ingredient)?,
            tag: compile("tag", &config.tag)?,
            image: compile("image", &config.image)?,
        })
    }
}

fn element_text(elem: ElementRef<'_>) -> String {
    normalize_whitespace(&elem.text().collect::<String>())
}

fn resolve_href(base: Option<&Url>, href: &str) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

/// Extract `{title, link}` cards from a listing page, in page order.
///
/// Cards missing a title or link are skipped.
pub fn parse_listing(
    content: &str,
    page_url: &str,
    selectors: &CompiledSelectors,
) -> Vec<ListingCard> {
    let document = Html::parse_document(content);
    let base = Url::parse(page_url).ok();
    let mut cards = Vec::new();

    for card in document.select(&selectors.card) {
        let title = card.select(&selectors.card_title).next().map(element_text);
        let href = card
            .select(&selectors.card_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty());

        match (title, href) {
            (Some(title), Some(href)) if !title.is_empty() => cards.push(ListingCard {
                title,
                link: resolve_href(base.as_ref(), href),
            }),
            _ => warn!("Skipping card without title or link on {}", page_url),
        }
    }

    debug!("Found {} cards on {}", cards.len(), page_url);
    cards
}

/// Extract the recipe fields from a recipe page.
///
/// Name, author, genre, prepare time and portion count are required; a
/// missing element is an extraction failure for `link`. Ingredients, tags and
/// the image are optional.
pub fn parse_recipe(
    content: &str,
    link: &str,
    selectors: &CompiledSelectors,
    genre_separator: &str,
) -> Result<RecipeFields> {
    let document = Html::parse_document(content);
    let base = Url::parse(link).ok();

    let required = |selector: &Selector, field: &str| -> Result<String> {
        document
            .select(selector)
            .next()
            .map(element_text)
            .ok_or_else(|| Error::extraction(link, format!("missing {} element", field)))
    };

    let name = required(&selectors.name, "name")?;
    if name.is_empty() {
        return Err(Error::extraction(link, "empty recipe name"));
    }

    let author = required(&selectors.author, "author")?;
    let genre = split_labels(&required(&selectors.genre, "genre")?, genre_separator);
    let prepare_time = required(&selectors.prepare_time, "prepare_time")?;
    let person_num = required(&selectors.person_num, "person_num")?;

    let ingredients = document
        .select(&selectors.ingredient)
        .map(element_text)
        .filter(|line| !line.is_empty())
        .collect();
    let tags = document
        .select(&selectors.tag)
        .map(element_text)
        .filter(|tag| !tag.is_empty())
        .collect();

    let image_url = document
        .select(&selectors.image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| resolve_href(base.as_ref(), src));

    Ok(RecipeFields {
        name,
        author,
        genre,
        prepare_time,
        person_num,
        ingredients,
        tags,
        image_url,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Listing page in the catalog's markup
    pub fn listing_html(cards: &[(&str, &str)]) -> String {
        let body: String = cards
            .iter()
            .map(|(title, href)| {
                format!(
                    r#"<div class="jum-card"><a class="card-recipe-link" href="{}"><h3 class="title">{}</h3></a></div>"#,
                    href, title
                )
            })
            .collect();
        format!("<html><body><main>{}</main></body></html>", body)
    }

    /// Recipe page in the catalog's markup
    pub fn recipe_html(
        name: &str,
        genres: &str,
        ingredients: &[&str],
        tags: &[&str],
        image_src: Option<&str>,
    ) -> String {
        let ingredients: String = ingredients
            .iter()
            .map(|i| format!(r#"<li class="ingredient">{}</li>"#, i))
            .collect();
        let tags: String = tags
            .iter()
            .map(|t| format!(r#"<span class="secondary">{}</span>"#, t))
            .collect();
        let image = image_src
            .map(|src| format!(r#"<img class="main-image" src="{}">"#, src))
            .unwrap_or_default();
        format!(
            r#"<html><body>
            <div class="recipe-header-container">
              <div class="recipe-header-inner"><h1 class="heading name">{name}</h1></div>
              {image}
              <div class="info"><p>25 min</p><p>{genres}</p></div>
            </div>
            <div class="author-info"><span class="author-name">Jumbo</span></div>
            <div class="labels-container">{tags}</div>
            <div class="ingredients-container">
              <div class="portion-size-selector"><div class="current-value"><span>4</span></div></div>
              <ul>{ingredients}</ul>
            </div>
            </body></html>"#,
            name = name,
            image = image,
            genres = genres,
            tags = tags,
            ingredients = ingredients,
        )
    }
}
