//! Raw materials (reusable ingredient templates) and recipes.
//!
//! Both reference inventory items by id. A recipe can be seeded from a raw
//! material; the ingredient list is copied once and never linked back.

pub mod service;
pub mod store;

pub use service::{Catalog, IngredientStock, ItemDeletion, RawMaterialStock, RecipeAvailability};
pub use store::CatalogStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::inventory::{check_ingredient_quantity, IngredientRef};

/// A named, reusable ingredient list. Never cooked directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub id: String,
    pub recipe_name: String,
    pub variation: Option<String>,
    pub ingredients: Vec<IngredientRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRawMaterial {
    pub recipe_name: String,
    #[serde(default)]
    pub variation: Option<String>,
    pub ingredients: Vec<IngredientRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMaterialPatch {
    pub recipe_name: Option<String>,
    pub variation: Option<String>,
    pub ingredients: Option<Vec<IngredientRef>>,
}

/// A preparation whose ingredients are deducted from stock when cooked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub instructions: Option<String>,
    /// Minutes.
    pub cook_time: Option<u32>,
    pub servings: Option<u32>,
    pub ingredients: Vec<IngredientRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub cook_time: Option<u32>,
    #[serde(default)]
    pub servings: Option<u32>,
    pub ingredients: Vec<IngredientRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub instructions: Option<String>,
    pub cook_time: Option<u32>,
    pub servings: Option<u32>,
    pub ingredients: Option<Vec<IngredientRef>>,
}

/// Overrides applied when seeding a recipe from a raw material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeSeed {
    /// Defaults to the raw material's `recipe_name`.
    pub title: Option<String>,
    pub instructions: Option<String>,
    pub cook_time: Option<u32>,
    pub servings: Option<u32>,
}

/// Shape checks shared by raw materials and recipes. Item existence is checked by [`Catalog`].
pub(crate) fn validate_shape(
    kind: &'static str,
    name_field: &'static str,
    name: &str,
    ingredients: &[IngredientRef],
) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyField(name_field));
    }
    if ingredients.is_empty() {
        return Err(ValidationError::EmptyIngredients(kind));
    }
    for ingredient in ingredients {
        if ingredient.item_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("ingredient.item_id"));
        }
        check_ingredient_quantity(ingredient.quantity)?;
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawMaterial {
    pub(crate) fn from_new(new: NewRawMaterial, id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            recipe_name: new.recipe_name.trim().to_string(),
            variation: non_blank(new.variation),
            ingredients: new.ingredients,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply_patch(&mut self, patch: RawMaterialPatch) {
        if let Some(name) = patch.recipe_name {
            self.recipe_name = name.trim().to_string();
        }
        if let Some(variation) = patch.variation {
            self.variation = non_blank(Some(variation));
        }
        if let Some(ingredients) = patch.ingredients {
            self.ingredients = ingredients;
        }
        self.updated_at = Utc::now();
    }
}

impl Recipe {
    pub(crate) fn from_new(new: NewRecipe, id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: new.title.trim().to_string(),
            instructions: non_blank(new.instructions),
            cook_time: new.cook_time,
            servings: new.servings,
            ingredients: new.ingredients,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply_patch(&mut self, patch: RecipePatch) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(instructions) = patch.instructions {
            self.instructions = non_blank(Some(instructions));
        }
        if let Some(cook_time) = patch.cook_time {
            self.cook_time = Some(cook_time);
        }
        if let Some(servings) = patch.servings {
            self.servings = Some(servings);
        }
        if let Some(ingredients) = patch.ingredients {
            self.ingredients = ingredients;
        }
        self.updated_at = Utc::now();
    }

    /// Distinct referenced item ids, in first-use order.
    pub fn item_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(self.ingredients.len());
        for ingredient in &self.ingredients {
            if !ids.contains(&ingredient.item_id.as_str()) {
                ids.push(&ingredient.item_id);
            }
        }
        ids
    }
}
