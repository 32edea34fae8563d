//! Raw material and recipe persistence.
//!
//! Stores are plain record keepers; validation and id assignment happen in
//! [`super::Catalog`].

use super::{RawMaterial, Recipe};
use crate::error::Result;

pub trait CatalogStore {
    fn get_raw_material(&self, id: &str) -> Result<Option<RawMaterial>>;

    /// All raw materials, sorted by name.
    fn list_raw_materials(&self) -> Result<Vec<RawMaterial>>;

    fn insert_raw_material(&self, raw_material: &RawMaterial) -> Result<()>;

    /// Returns `false` if no raw material with that id exists.
    fn replace_raw_material(&self, raw_material: &RawMaterial) -> Result<bool>;

    fn delete_raw_material(&self, id: &str) -> Result<bool>;

    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>>;

    /// All recipes, sorted by title.
    fn list_recipes(&self) -> Result<Vec<Recipe>>;

    fn insert_recipe(&self, recipe: &Recipe) -> Result<()>;

    /// Returns `false` if no recipe with that id exists.
    fn replace_recipe(&self, recipe: &Recipe) -> Result<bool>;

    fn delete_recipe(&self, id: &str) -> Result<bool>;
}
