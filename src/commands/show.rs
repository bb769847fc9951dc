//! Show command implementation

use crate::error::{Error, Result};
use crate::store::{LabelKind, RecipeStore, INGREDIENT_SEPARATOR};
use serde::{Deserialize, Serialize};

/// One stored recipe with its labels decoded from the slot columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeView {
    pub id: i64,
    pub name: String,
    pub author: Option<String>,
    pub prepare_time: Option<String>,
    pub person_num: Option<String>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    /// Stored image size in bytes
    pub image_bytes: Option<usize>,
}

/// Load a recipe by name
pub async fn cmd_show(store: &RecipeStore, name: &str) -> Result<RecipeView> {
    let recipe = store
        .get_recipe(name)
        .await?
        .ok_or_else(|| Error::RecipeNotFound(name.to_string()))?;

    let genre_ids = store.recipe_slot_ids(name, LabelKind::Genre).await?;
    let tag_ids = store.recipe_slot_ids(name, LabelKind::Tag).await?;

    let ingredients = recipe
        .ingredients
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.split(INGREDIENT_SEPARATOR).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(RecipeView {
        id: recipe.id,
        genres: store.label_names(LabelKind::Genre, &genre_ids).await?,
        tags: store.label_names(LabelKind::Tag, &tag_ids).await?,
        image_bytes: recipe.image.as_ref().map(Vec::len),
        ingredients,
        name: recipe.name,
        author: recipe.author,
        prepare_time: recipe.prepare_time,
        person_num: recipe.person_num,
    })
}

/// Print a recipe to console
pub fn print_recipe(recipe: &RecipeView) {
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    println!("\n🍽  {}\n", recipe.name);
    println!("Author: {}", or_dash(&recipe.author));
    println!("Preparation: {}", or_dash(&recipe.prepare_time));
    println!("Persons: {}", or_dash(&recipe.person_num));
    println!("Genres: {}", recipe.genres.join(", "));
    println!("Tags: {}", recipe.tags.join(", "));
    match recipe.image_bytes {
        Some(bytes) => println!("Image: {} bytes", bytes),
        None => println!("Image: none"),
    }
    println!("\nIngredients:");
    for line in &recipe.ingredients {
        println!("  • {}", line);
    }
}
