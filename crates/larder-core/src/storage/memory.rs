//! In-memory pantry behind a single mutex.
//!
//! Every read and write takes the same lock, which gives `apply_deltas`
//! store-wide transaction semantics. Useful for tests and embedding.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::catalog::{CatalogStore, RawMaterial, Recipe};
use crate::error::Result;
use crate::inventory::{
    resolve_delta, validate_deltas, DeltaMap, DeltaOutcome, InventoryItem, InventoryPatch,
    InventoryStore, NewInventoryItem, StockSnapshot,
};

#[derive(Default)]
struct PantryState {
    items: HashMap<String, InventoryItem>,
    raw_materials: HashMap<String, RawMaterial>,
    recipes: HashMap<String, Recipe>,
}

#[derive(Default)]
pub struct MemoryPantry {
    state: Mutex<PantryState>,
}

impl MemoryPantry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PantryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InventoryStore for MemoryPantry {
    fn get_item(&self, id: &str) -> Result<Option<InventoryItem>> {
        Ok(self.state().items.get(id).cloned())
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>> {
        let mut items: Vec<_> = self.state().items.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    fn create_item(&self, item: NewInventoryItem) -> Result<InventoryItem> {
        let item = item.into_item()?;
        self.state().items.insert(item.id.clone(), item.clone());
        info!(id = %item.id, name = %item.name, quantity = item.quantity, "inventory item created");
        Ok(item)
    }

    fn update_item(&self, id: &str, patch: &InventoryPatch) -> Result<Option<InventoryItem>> {
        let mut state = self.state();
        let Some(item) = state.items.get_mut(id) else {
            return Ok(None);
        };
        item.apply_patch(patch)?;
        Ok(Some(item.clone()))
    }

    fn delete_item(&self, id: &str) -> Result<bool> {
        Ok(self.state().items.remove(id).is_some())
    }

    fn snapshot(&self, ids: &[&str]) -> Result<StockSnapshot> {
        let state = self.state();
        Ok(StockSnapshot::from_items(
            ids.iter().filter_map(|id| state.items.get(*id).cloned()),
        ))
    }

    fn apply_deltas(&self, deltas: &DeltaMap) -> Result<DeltaOutcome> {
        validate_deltas(deltas)?;
        let mut state = self.state();
        let mut changes = Vec::with_capacity(deltas.len());
        let mut shortfalls = Vec::new();
        for (item_id, &delta) in deltas {
            let current = state.items.get(item_id).map(|i| i.quantity);
            match resolve_delta(item_id, current, delta) {
                Ok(change) => changes.push(change),
                Err(shortfall) => shortfalls.push(shortfall),
            }
        }
        if !shortfalls.is_empty() {
            return Ok(DeltaOutcome::Insufficient(shortfalls));
        }

        let now = chrono::Utc::now();
        for change in &changes {
            if let Some(item) = state.items.get_mut(&change.item_id) {
                item.quantity = change.after;
                item.updated_at = now;
            }
        }
        Ok(DeltaOutcome::Committed(changes))
    }
}

impl CatalogStore for MemoryPantry {
    fn get_raw_material(&self, id: &str) -> Result<Option<RawMaterial>> {
        Ok(self.state().raw_materials.get(id).cloned())
    }

    fn list_raw_materials(&self) -> Result<Vec<RawMaterial>> {
        let mut raw_materials: Vec<_> = self.state().raw_materials.values().cloned().collect();
        raw_materials.sort_by(|a, b| a.recipe_name.cmp(&b.recipe_name).then_with(|| a.id.cmp(&b.id)));
        Ok(raw_materials)
    }

    fn insert_raw_material(&self, raw_material: &RawMaterial) -> Result<()> {
        self.state()
            .raw_materials
            .insert(raw_material.id.clone(), raw_material.clone());
        Ok(())
    }

    fn replace_raw_material(&self, raw_material: &RawMaterial) -> Result<bool> {
        let mut state = self.state();
        match state.raw_materials.get_mut(&raw_material.id) {
            Some(existing) => {
                *existing = raw_material.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_raw_material(&self, id: &str) -> Result<bool> {
        Ok(self.state().raw_materials.remove(id).is_some())
    }

    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        Ok(self.state().recipes.get(id).cloned())
    }

    fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut recipes: Vec<_> = self.state().recipes.values().cloned().collect();
        recipes.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(recipes)
    }

    fn insert_recipe(&self, recipe: &Recipe) -> Result<()> {
        self.state().recipes.insert(recipe.id.clone(), recipe.clone());
        Ok(())
    }

    fn replace_recipe(&self, recipe: &Recipe) -> Result<bool> {
        let mut state = self.state();
        match state.recipes.get_mut(&recipe.id) {
            Some(existing) => {
                *existing = recipe.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_recipe(&self, id: &str) -> Result<bool> {
        Ok(self.state().recipes.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ValidationError};

    #[test]
    fn apply_deltas_rejects_deleted_item() {
        let pantry = MemoryPantry::new();
        let eggs = pantry.create_item(NewInventoryItem::new("eggs", 12.0, "pcs")).unwrap();
        pantry.delete_item(&eggs.id).unwrap();

        let deltas = DeltaMap::from([(eggs.id.clone(), -2.0)]);
        match pantry.apply_deltas(&deltas).unwrap() {
            DeltaOutcome::Insufficient(shortfalls) => assert_eq!(shortfalls[0].available, 0.0),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn positive_delta_restocks() {
        let pantry = MemoryPantry::new();
        let milk = pantry.create_item(NewInventoryItem::new("milk", 1.0, "L")).unwrap();
        let deltas = DeltaMap::from([(milk.id.clone(), 2.0)]);
        assert!(pantry.apply_deltas(&deltas).unwrap().is_committed());
        assert_eq!(pantry.get_item(&milk.id).unwrap().unwrap().quantity, 3.0);
    }

    #[test]
    fn update_rejects_invalid_patch_without_change() {
        let pantry = MemoryPantry::new();
        let milk = pantry.create_item(NewInventoryItem::new("milk", 1.0, "L")).unwrap();
        let patch = InventoryPatch {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(pantry.update_item(&milk.id, &patch).is_err());
        assert_eq!(pantry.get_item(&milk.id).unwrap().unwrap().name, "milk");
    }

    #[test]
    fn non_finite_delta_is_rejected_without_change() {
        let pantry = MemoryPantry::new();
        let flour = pantry.create_item(NewInventoryItem::new("flour", 500.0, "g")).unwrap();
        for bad in [f64::NAN, f64::INFINITY] {
            let deltas = DeltaMap::from([(flour.id.clone(), bad)]);
            assert!(matches!(
                pantry.apply_deltas(&deltas),
                Err(CoreError::Validation(ValidationError::InvalidQuantity { .. }))
            ));
        }
        assert_eq!(pantry.get_item(&flour.id).unwrap().unwrap().quantity, 500.0);
    }
}
