//! Validated create/update/delete for raw materials and recipes.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    validate_shape, CatalogStore, NewRawMaterial, NewRecipe, RawMaterial, RawMaterialPatch,
    Recipe, RecipePatch, RecipeSeed,
};
use crate::error::{CoreError, Result, ValidationError};
use crate::inventory::{IngredientRef, InventoryStore, StockSnapshot};
use crate::stock::{find_deficits, is_low_stock, requirements, Deficit, MinStockTable};

/// Cookability of one recipe, judged against a shared snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeAvailability {
    pub recipe_id: String,
    pub title: String,
    pub can_cook: bool,
    pub deficits: Vec<Deficit>,
}

/// Live stock behind one raw material ingredient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientStock {
    pub item_id: String,
    /// `None` when the item was deleted.
    pub name: Option<String>,
    pub required: f64,
    /// 0 when the item was deleted.
    pub available: f64,
    pub unit: Option<String>,
    pub low_stock: bool,
}

/// A raw material with the stock status of each ingredient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMaterialStock {
    #[serde(flatten)]
    pub raw_material: RawMaterial,
    pub stock: Vec<IngredientStock>,
}

/// What an item deletion left behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemDeletion {
    pub item_id: String,
    /// Recipes that now hold a dangling reference.
    pub recipes: Vec<String>,
    /// Raw materials that now hold a dangling reference.
    pub raw_materials: Vec<String>,
}

/// Catalog operations over a store that provides both inventory and catalog records.
pub struct Catalog<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> Catalog<'a, S>
where
    S: InventoryStore + CatalogStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read every referenced item at once and fail on the first missing one.
    fn check_references(&self, ingredients: &[IngredientRef]) -> Result<StockSnapshot> {
        let ids: Vec<&str> = ingredients.iter().map(|i| i.item_id.as_str()).collect();
        let snapshot = self.store.snapshot(&ids)?;
        if let Some(missing) = ingredients.iter().find(|i| !snapshot.contains(&i.item_id)) {
            return Err(ValidationError::MissingItem {
                item_id: missing.item_id.clone(),
            }
            .into());
        }
        Ok(snapshot)
    }

    /// Blank units are copied from the item's current unit.
    fn fill_units(ingredients: &mut [IngredientRef], snapshot: &StockSnapshot) {
        for ingredient in ingredients.iter_mut() {
            let blank = ingredient
                .unit
                .as_deref()
                .map_or(true, |u| u.trim().is_empty());
            if blank {
                ingredient.unit = snapshot.get(&ingredient.item_id).map(|i| i.unit.clone());
            }
        }
    }

    // === Raw materials ===

    pub fn create_raw_material(&self, new: NewRawMaterial) -> Result<RawMaterial> {
        validate_shape("raw material", "recipe_name", &new.recipe_name, &new.ingredients)?;
        self.check_references(&new.ingredients)?;
        let raw_material = RawMaterial::from_new(new, Uuid::new_v4().to_string());
        self.store.insert_raw_material(&raw_material)?;
        info!(id = %raw_material.id, name = %raw_material.recipe_name, "raw material created");
        Ok(raw_material)
    }

    pub fn get_raw_material(&self, id: &str) -> Result<RawMaterial> {
        self.store
            .get_raw_material(id)?
            .ok_or_else(|| CoreError::not_found("raw material", id))
    }

    /// A raw material plus per-ingredient stock, all read from one snapshot.
    /// Deleted items count as low.
    pub fn raw_material_stock(&self, id: &str, table: &MinStockTable) -> Result<RawMaterialStock> {
        let raw_material = self.get_raw_material(id)?;
        let ids: Vec<&str> = raw_material.ingredients.iter().map(|i| i.item_id.as_str()).collect();
        let snapshot = self.store.snapshot(&ids)?;
        let stock = raw_material
            .ingredients
            .iter()
            .map(|ingredient| match snapshot.get(&ingredient.item_id) {
                Some(item) => IngredientStock {
                    item_id: item.id.clone(),
                    name: Some(item.name.clone()),
                    required: ingredient.quantity,
                    available: item.quantity,
                    unit: Some(item.unit.clone()),
                    low_stock: is_low_stock(item, table),
                },
                None => IngredientStock {
                    item_id: ingredient.item_id.clone(),
                    name: None,
                    required: ingredient.quantity,
                    available: 0.0,
                    unit: None,
                    low_stock: true,
                },
            })
            .collect();
        Ok(RawMaterialStock { raw_material, stock })
    }

    pub fn list_raw_materials(&self) -> Result<Vec<RawMaterial>> {
        self.store.list_raw_materials()
    }

    pub fn update_raw_material(&self, id: &str, patch: RawMaterialPatch) -> Result<RawMaterial> {
        let mut raw_material = self.get_raw_material(id)?;
        raw_material.apply_patch(patch);
        validate_shape(
            "raw material",
            "recipe_name",
            &raw_material.recipe_name,
            &raw_material.ingredients,
        )?;
        self.check_references(&raw_material.ingredients)?;
        if !self.store.replace_raw_material(&raw_material)? {
            return Err(CoreError::not_found("raw material", id));
        }
        Ok(raw_material)
    }

    pub fn delete_raw_material(&self, id: &str) -> Result<()> {
        if !self.store.delete_raw_material(id)? {
            return Err(CoreError::not_found("raw material", id));
        }
        Ok(())
    }

    // === Recipes ===

    pub fn create_recipe(&self, mut new: NewRecipe) -> Result<Recipe> {
        validate_shape("recipe", "title", &new.title, &new.ingredients)?;
        let snapshot = self.check_references(&new.ingredients)?;
        Self::fill_units(&mut new.ingredients, &snapshot);
        let recipe = Recipe::from_new(new, Uuid::new_v4().to_string());
        self.store.insert_recipe(&recipe)?;
        info!(id = %recipe.id, title = %recipe.title, "recipe created");
        Ok(recipe)
    }

    /// Copy a raw material's current ingredients (with each item's current unit) into a new recipe.
    pub fn create_recipe_from_raw_material(
        &self,
        raw_material_id: &str,
        seed: RecipeSeed,
    ) -> Result<Recipe> {
        let raw_material = self.get_raw_material(raw_material_id)?;
        let ingredients = raw_material
            .ingredients
            .iter()
            .map(|i| IngredientRef {
                item_id: i.item_id.clone(),
                quantity: i.quantity,
                unit: None,
            })
            .collect();
        let title = seed
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| raw_material.recipe_name.clone());
        self.create_recipe(NewRecipe {
            title,
            instructions: seed.instructions,
            cook_time: seed.cook_time,
            servings: seed.servings,
            ingredients,
        })
    }

    pub fn get_recipe(&self, id: &str) -> Result<Recipe> {
        self.store
            .get_recipe(id)?
            .ok_or_else(|| CoreError::not_found("recipe", id))
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.store.list_recipes()
    }

    pub fn update_recipe(&self, id: &str, patch: RecipePatch) -> Result<Recipe> {
        let mut recipe = self.get_recipe(id)?;
        recipe.apply_patch(patch);
        validate_shape("recipe", "title", &recipe.title, &recipe.ingredients)?;
        let snapshot = self.check_references(&recipe.ingredients)?;
        Self::fill_units(&mut recipe.ingredients, &snapshot);
        if !self.store.replace_recipe(&recipe)? {
            return Err(CoreError::not_found("recipe", id));
        }
        Ok(recipe)
    }

    pub fn delete_recipe(&self, id: &str) -> Result<()> {
        if !self.store.delete_recipe(id)? {
            return Err(CoreError::not_found("recipe", id));
        }
        Ok(())
    }

    /// Cookability of every recipe from one snapshot of all referenced items.
    pub fn recipe_availability(&self) -> Result<Vec<RecipeAvailability>> {
        let recipes = self.store.list_recipes()?;
        let mut ids: Vec<&str> = recipes.iter().flat_map(|r| r.item_ids()).collect();
        ids.sort_unstable();
        ids.dedup();
        let snapshot = self.store.snapshot(&ids)?;

        Ok(recipes
            .iter()
            .map(|recipe| {
                let deficits = find_deficits(&requirements(&recipe.ingredients), &snapshot);
                RecipeAvailability {
                    recipe_id: recipe.id.clone(),
                    title: recipe.title.clone(),
                    can_cook: deficits.is_empty(),
                    deficits,
                }
            })
            .collect())
    }

    /// Recipe ids and raw material ids that reference `item_id`.
    pub fn references_to(&self, item_id: &str) -> Result<ItemDeletion> {
        let uses = |ingredients: &[IngredientRef]| ingredients.iter().any(|i| i.item_id == item_id);
        Ok(ItemDeletion {
            item_id: item_id.to_string(),
            recipes: self
                .store
                .list_recipes()?
                .into_iter()
                .filter(|r| uses(&r.ingredients))
                .map(|r| r.id)
                .collect(),
            raw_materials: self
                .store
                .list_raw_materials()?
                .into_iter()
                .filter(|m| uses(&m.ingredients))
                .map(|m| m.id)
                .collect(),
        })
    }

    /// Delete an inventory item, reporting the references it leaves dangling.
    pub fn delete_item(&self, item_id: &str) -> Result<ItemDeletion> {
        let deletion = self.references_to(item_id)?;
        if !self.store.delete_item(item_id)? {
            return Err(CoreError::not_found("inventory item", item_id));
        }
        if !deletion.recipes.is_empty() || !deletion.raw_materials.is_empty() {
            warn!(
                item_id,
                recipes = deletion.recipes.len(),
                raw_materials = deletion.raw_materials.len(),
                "deleted item is still referenced"
            );
        }
        Ok(deletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::NewInventoryItem;
    use crate::storage::MemoryPantry;

    fn pantry_with_flour_and_sugar() -> (MemoryPantry, String, String) {
        let pantry = MemoryPantry::new();
        let flour = pantry.create_item(NewInventoryItem::new("flour", 500.0, "g")).unwrap();
        let sugar = pantry.create_item(NewInventoryItem::new("sugar", 60.0, "g")).unwrap();
        (pantry, flour.id, sugar.id)
    }

    #[test]
    fn create_recipe_fills_units_from_items() {
        let (pantry, flour, sugar) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        let recipe = catalog
            .create_recipe(NewRecipe {
                title: "cake".into(),
                ingredients: vec![
                    IngredientRef::new(flour, 300.0),
                    IngredientRef {
                        item_id: sugar,
                        quantity: 50.0,
                        unit: Some("grams".into()),
                    },
                ],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(recipe.ingredients[0].unit.as_deref(), Some("g"));
        assert_eq!(recipe.ingredients[1].unit.as_deref(), Some("grams"));
    }

    #[test]
    fn create_recipe_rejects_unknown_item() {
        let (pantry, flour, _) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        let err = catalog
            .create_recipe(NewRecipe {
                title: "cake".into(),
                ingredients: vec![IngredientRef::new(flour, 1.0), IngredientRef::new("nope", 1.0)],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingItem { ref item_id }) if item_id == "nope"
        ));
        assert!(catalog.list_recipes().unwrap().is_empty());
    }

    #[test]
    fn create_raw_material_requires_ingredients() {
        let (pantry, _, _) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        let err = catalog
            .create_raw_material(NewRawMaterial {
                recipe_name: "dough".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::EmptyIngredients(_))
        ));
    }

    #[test]
    fn seeded_recipe_is_a_copy() {
        let (pantry, flour, sugar) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        let base = catalog
            .create_raw_material(NewRawMaterial {
                recipe_name: "sponge base".into(),
                variation: Some("vanilla".into()),
                ingredients: vec![IngredientRef::new(flour.clone(), 200.0), IngredientRef::new(sugar, 20.0)],
            })
            .unwrap();

        let recipe = catalog
            .create_recipe_from_raw_material(&base.id, RecipeSeed::default())
            .unwrap();
        assert_eq!(recipe.title, "sponge base");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].unit.as_deref(), Some("g"));

        catalog
            .update_raw_material(
                &base.id,
                RawMaterialPatch {
                    ingredients: Some(vec![IngredientRef::new(flour, 999.0)]),
                    ..Default::default()
                },
            )
            .unwrap();
        let reloaded = catalog.get_recipe(&recipe.id).unwrap();
        assert_eq!(reloaded.ingredients.len(), 2);
        assert_eq!(reloaded.ingredients[0].quantity, 200.0);
    }

    #[test]
    fn seeding_from_missing_raw_material_is_not_found() {
        let (pantry, _, _) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        let err = catalog
            .create_recipe_from_raw_material("missing", RecipeSeed::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: "raw material", .. }));
    }

    #[test]
    fn update_recipe_keeps_validation() {
        let (pantry, flour, _) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        let recipe = catalog
            .create_recipe(NewRecipe {
                title: "bread".into(),
                ingredients: vec![IngredientRef::new(flour, 300.0)],
                ..Default::default()
            })
            .unwrap();
        let err = catalog
            .update_recipe(
                &recipe.id,
                RecipePatch {
                    ingredients: Some(vec![]),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(catalog.get_recipe(&recipe.id).unwrap().ingredients.len(), 1);

        let updated = catalog
            .update_recipe(
                &recipe.id,
                RecipePatch {
                    servings: Some(4),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.servings, Some(4));
    }

    #[test]
    fn availability_and_dangling_references() {
        let (pantry, flour, sugar) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        let cake = catalog
            .create_recipe(NewRecipe {
                title: "cake".into(),
                ingredients: vec![IngredientRef::new(flour.clone(), 300.0), IngredientRef::new(sugar.clone(), 50.0)],
                ..Default::default()
            })
            .unwrap();
        let availability = catalog.recipe_availability().unwrap();
        assert!(availability[0].can_cook);

        let deletion = catalog.delete_item(&sugar).unwrap();
        assert_eq!(deletion.recipes, vec![cake.id.clone()]);

        let availability = catalog.recipe_availability().unwrap();
        assert!(!availability[0].can_cook);
        assert!(availability[0].deficits[0].is_dangling());

        assert!(matches!(
            catalog.delete_item(&sugar).unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn delete_recipe_reports_not_found() {
        let (pantry, _, _) = pantry_with_flour_and_sugar();
        let catalog = Catalog::new(&pantry);
        assert!(matches!(
            catalog.delete_recipe("missing").unwrap_err(),
            CoreError::NotFound { kind: "recipe", .. }
        ));
    }

    #[test]
    fn raw_material_stock_flags_low_and_deleted_ingredients() {
        let (pantry, flour, sugar) = pantry_with_flour_and_sugar();
        let yeast = pantry.create_item(NewInventoryItem::new("yeast", 7.0, "g")).unwrap();
        let catalog = Catalog::new(&pantry);
        let dough = catalog
            .create_raw_material(NewRawMaterial {
                recipe_name: "dough".into(),
                variation: None,
                ingredients: vec![
                    IngredientRef::new(flour, 300.0),
                    IngredientRef::new(yeast.id.clone(), 5.0),
                    IngredientRef::new(sugar.clone(), 10.0),
                ],
            })
            .unwrap();
        pantry.delete_item(&sugar).unwrap();

        let view = catalog.raw_material_stock(&dough.id, &MinStockTable::default()).unwrap();
        assert_eq!(view.raw_material.id, dough.id);
        let low: Vec<bool> = view.stock.iter().map(|s| s.low_stock).collect();
        assert_eq!(low, vec![false, true, true]);
        assert_eq!(view.stock[1].name.as_deref(), Some("yeast"));
        assert_eq!(view.stock[2].name, None);
        assert_eq!(view.stock[2].available, 0.0);
    }
}
