//! Stock evaluation: low-stock status and recipe sufficiency.
//!
//! Everything here is pure. Sufficiency is always judged against a single
//! [`StockSnapshot`] taken by the caller, never against live store reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::inventory::{IngredientRef, InventoryItem, StockSnapshot, QUANTITY_EPSILON};

/// Aggregate required quantity per item id.
pub type Requirements = BTreeMap<String, f64>;

/// Default minimum-stock thresholds keyed by unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinStockTable {
    pub by_unit: BTreeMap<String, f64>,
    /// Threshold for units absent from `by_unit`.
    pub fallback: f64,
}

impl Default for MinStockTable {
    fn default() -> Self {
        Self {
            by_unit: default_min_stock_by_unit(),
            fallback: DEFAULT_FALLBACK_MIN_STOCK,
        }
    }
}

pub const DEFAULT_FALLBACK_MIN_STOCK: f64 = 10.0;

pub fn default_min_stock_by_unit() -> BTreeMap<String, f64> {
    [
        ("kg", 1.0),
        ("L", 1.0),
        ("g", 50.0),
        ("ml", 100.0),
        ("pcs", 5.0),
        ("dozen", 1.0),
        ("cup", 2.0),
        ("tbsp", 3.0),
        ("tsp", 5.0),
    ]
    .into_iter()
    .map(|(unit, min)| (unit.to_string(), min))
    .collect()
}

impl MinStockTable {
    /// Threshold for a unit: exact key first, then ASCII case-insensitive.
    pub fn threshold_for(&self, unit: &str) -> f64 {
        let unit = unit.trim();
        if let Some(min) = self.by_unit.get(unit) {
            return *min;
        }
        self.by_unit
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(unit))
            .map(|(_, min)| *min)
            .unwrap_or(self.fallback)
    }
}

/// `item.min_stock` when set (an explicit 0 counts), otherwise the unit default.
pub fn effective_min_stock(item: &InventoryItem, table: &MinStockTable) -> f64 {
    item.min_stock
        .unwrap_or_else(|| table.threshold_for(&item.unit))
}

pub fn is_low_stock(item: &InventoryItem, table: &MinStockTable) -> bool {
    item.quantity <= effective_min_stock(item, table)
}

/// An item flagged by [`low_stock_report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub item_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub min_stock: f64,
}

pub fn low_stock_report(items: &[InventoryItem], table: &MinStockTable) -> Vec<LowStockEntry> {
    items
        .iter()
        .filter(|item| is_low_stock(item, table))
        .map(|item| LowStockEntry {
            item_id: item.id.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            min_stock: effective_min_stock(item, table),
        })
        .collect()
}

/// Sum ingredient quantities per item id.
pub fn requirements(ingredients: &[IngredientRef]) -> Requirements {
    let mut required = Requirements::new();
    for ingredient in ingredients {
        *required.entry(ingredient.item_id.clone()).or_insert(0.0) += ingredient.quantity;
    }
    required
}

/// An ingredient the snapshot cannot cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deficit {
    pub item_id: String,
    /// `None` for a dangling reference to a deleted item.
    pub name: Option<String>,
    pub required: f64,
    pub available: f64,
}

impl Deficit {
    pub fn is_dangling(&self) -> bool {
        self.name.is_none()
    }
}

/// Every requirement the snapshot cannot meet. Missing items count as zero stock.
pub fn find_deficits(required: &Requirements, snapshot: &StockSnapshot) -> Vec<Deficit> {
    required
        .iter()
        .filter_map(|(item_id, &needed)| match snapshot.get(item_id) {
            Some(item) if item.quantity + QUANTITY_EPSILON >= needed => None,
            Some(item) => Some(Deficit {
                item_id: item_id.clone(),
                name: Some(item.name.clone()),
                required: needed,
                available: item.quantity,
            }),
            None => Some(Deficit {
                item_id: item_id.clone(),
                name: None,
                required: needed,
                available: 0.0,
            }),
        })
        .collect()
}

/// True iff every referenced item exists in the snapshot with enough stock.
pub fn can_satisfy(ingredients: &[IngredientRef], snapshot: &StockSnapshot) -> bool {
    find_deficits(&requirements(ingredients), snapshot).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::NewInventoryItem;

    fn item(name: &str, quantity: f64, unit: &str) -> InventoryItem {
        NewInventoryItem::new(name, quantity, unit).into_item().unwrap()
    }

    #[test]
    fn grams_default_threshold_is_fifty() {
        let table = MinStockTable::default();
        assert!(is_low_stock(&item("flour", 49.0, "g"), &table));
        assert!(is_low_stock(&item("flour", 50.0, "g"), &table));
        assert!(!is_low_stock(&item("flour", 51.0, "g"), &table));
    }

    #[test]
    fn documented_unit_defaults() {
        let table = MinStockTable::default();
        assert_eq!(table.threshold_for("kg"), 1.0);
        assert_eq!(table.threshold_for("L"), 1.0);
        assert_eq!(table.threshold_for("ml"), 100.0);
        assert_eq!(table.threshold_for("pcs"), 5.0);
        assert_eq!(table.threshold_for("dozen"), 1.0);
        assert_eq!(table.threshold_for("cup"), 2.0);
        assert_eq!(table.threshold_for("tbsp"), 3.0);
        assert_eq!(table.threshold_for("tsp"), 5.0);
        assert_eq!(table.threshold_for("bunch"), 10.0);
    }

    #[test]
    fn unit_lookup_falls_back_to_case_insensitive() {
        let table = MinStockTable::default();
        assert_eq!(table.threshold_for("l"), 1.0);
        assert_eq!(table.threshold_for("KG"), 1.0);
    }

    #[test]
    fn explicit_min_stock_wins_even_when_zero() {
        let table = MinStockTable::default();
        let mut salt = item("salt", 0.5, "kg");
        assert!(is_low_stock(&salt, &table));
        salt.min_stock = Some(0.0);
        assert!(!is_low_stock(&salt, &table));
        salt.quantity = 0.0;
        assert!(is_low_stock(&salt, &table));
    }

    #[test]
    fn low_stock_report_lists_only_low_items() {
        let table = MinStockTable::default();
        let items = vec![item("eggs", 3.0, "pcs"), item("milk", 2.0, "L")];
        let report = low_stock_report(&items, &table);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].name, "eggs");
        assert_eq!(report[0].min_stock, 5.0);
    }

    #[test]
    fn requirements_aggregate_duplicate_items() {
        let required = requirements(&[
            IngredientRef::new("a", 2.0),
            IngredientRef::new("b", 1.0),
            IngredientRef::new("a", 3.0),
        ]);
        assert_eq!(required.get("a"), Some(&5.0));
        assert_eq!(required.get("b"), Some(&1.0));
    }

    #[test]
    fn deficits_use_aggregate_requirement() {
        let flour = item("flour", 4.0, "kg");
        let snapshot = StockSnapshot::from_items([flour.clone()]);
        let ingredients = vec![
            IngredientRef::new(flour.id.clone(), 3.0),
            IngredientRef::new(flour.id.clone(), 3.0),
        ];
        assert!(!can_satisfy(&ingredients, &snapshot));
        let deficits = find_deficits(&requirements(&ingredients), &snapshot);
        assert_eq!(deficits[0].required, 6.0);
        assert_eq!(deficits[0].available, 4.0);
    }

    #[test]
    fn deficit_boundary_tolerates_only_float_residue() {
        let oil = item("oil", 0.3, "L");
        let snapshot = StockSnapshot::from_items([oil.clone()]);
        // 0.1 + 0.2 sums to slightly more than 0.3.
        assert!(can_satisfy(
            &[IngredientRef::new(oil.id.clone(), 0.1), IngredientRef::new(oil.id.clone(), 0.2)],
            &snapshot
        ));
        assert!(can_satisfy(
            &[IngredientRef::new(oil.id.clone(), oil.quantity + QUANTITY_EPSILON / 2.0)],
            &snapshot
        ));
        assert!(!can_satisfy(&[IngredientRef::new(oil.id.clone(), oil.quantity + 1e-6)], &snapshot));
    }

    #[test]
    fn dangling_reference_is_never_satisfied() {
        let snapshot = StockSnapshot::default();
        let ingredients = vec![IngredientRef::new("deleted", 1.0)];
        assert!(!can_satisfy(&ingredients, &snapshot));
        let deficits = find_deficits(&requirements(&ingredients), &snapshot);
        assert!(deficits[0].is_dangling());
        assert_eq!(deficits[0].available, 0.0);
    }

    #[test]
    fn can_satisfy_is_stable_without_mutation() {
        let flour = item("flour", 500.0, "g");
        let sugar = item("sugar", 40.0, "g");
        let snapshot = StockSnapshot::from_items([flour.clone(), sugar.clone()]);
        let ingredients = vec![
            IngredientRef::new(flour.id.clone(), 300.0),
            IngredientRef::new(sugar.id.clone(), 50.0),
        ];
        let first = can_satisfy(&ingredients, &snapshot);
        for _ in 0..10 {
            assert_eq!(can_satisfy(&ingredients, &snapshot), first);
        }
        assert!(!first);
    }
}
