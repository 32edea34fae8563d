//! Inventory items and the stock-change vocabulary shared by every store backend.
//!
//! An [`InventoryItem`] is the single source of truth for stock. Recipes and raw
//! materials only reference items by id through [`IngredientRef`].

pub mod store;

pub use store::InventoryStore;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Residue below zero that is treated as exactly zero when committing deltas.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Signed quantity change per item id. Ordered so commits touch items deterministically.
pub type DeltaMap = BTreeMap<String, f64>;

/// A stock-tracked ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub min_stock: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when adding an item. The store assigns id and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub min_stock: Option<f64>,
}

/// Manual edit of an item. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryPatch {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub min_stock: Option<f64>,
}

/// Reference from a recipe or raw material to an inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRef {
    pub item_id: String,
    pub quantity: f64,
    /// Display label copied from the item when authored; may drift from the item's unit.
    #[serde(default)]
    pub unit: Option<String>,
}

impl IngredientRef {
    pub fn new(item_id: impl Into<String>, quantity: f64) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
            unit: None,
        }
    }
}

/// One atomic read of a set of items. Ids missing from the store are absent here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockSnapshot {
    items: HashMap<String, InventoryItem>,
}

impl StockSnapshot {
    pub fn from_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&InventoryItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Per-item result of a committed delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockChange {
    pub item_id: String,
    pub before: f64,
    pub after: f64,
}

/// An item whose resulting quantity would have gone negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub item_id: String,
    /// Amount the delta tried to remove.
    pub requested: f64,
    /// Live quantity at commit time; 0 when the item no longer exists.
    pub available: f64,
    pub shortfall: f64,
}

/// Result of [`InventoryStore::apply_deltas`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DeltaOutcome {
    Committed(Vec<StockChange>),
    Insufficient(Vec<Shortfall>),
}

impl DeltaOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, DeltaOutcome::Committed(_))
    }
}

/// Compute the committed quantity for one item, or the shortfall if it would go negative.
///
/// `current` is `None` when the item no longer exists.
pub fn resolve_delta(item_id: &str, current: Option<f64>, delta: f64) -> Result<StockChange, Shortfall> {
    let Some(before) = current else {
        return Err(Shortfall {
            item_id: item_id.to_string(),
            requested: (-delta).max(0.0),
            available: 0.0,
            shortfall: (-delta).max(0.0),
        });
    };
    let after = before + delta;
    if after < -QUANTITY_EPSILON {
        return Err(Shortfall {
            item_id: item_id.to_string(),
            requested: -delta,
            available: before,
            shortfall: -after,
        });
    }
    Ok(StockChange {
        item_id: item_id.to_string(),
        before,
        after: after.max(0.0),
    })
}

fn check_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidQuantity {
            field,
            value,
            message: "must be a finite number",
        });
    }
    if value < 0.0 {
        return Err(ValidationError::InvalidQuantity {
            field,
            value,
            message: "must not be negative",
        });
    }
    Ok(())
}

/// Ingredient quantities must be finite and strictly positive.
pub(crate) fn check_ingredient_quantity(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidQuantity {
            field: "ingredient.quantity",
            value,
            message: "must be greater than zero",
        });
    }
    Ok(())
}

/// Deltas must be finite; NaN or infinity would corrupt the stored quantity.
pub(crate) fn validate_deltas(deltas: &DeltaMap) -> Result<(), ValidationError> {
    match deltas.values().find(|d| !d.is_finite()) {
        Some(&delta) => Err(ValidationError::InvalidQuantity {
            field: "delta",
            value: delta,
            message: "must be a finite number",
        }),
        None => Ok(()),
    }
}

impl NewInventoryItem {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("name", &self.name)?;
        check_text("unit", &self.unit)?;
        check_non_negative("quantity", self.quantity)?;
        if let Some(price) = self.price {
            check_non_negative("price", price)?;
        }
        if let Some(min_stock) = self.min_stock {
            check_non_negative("min_stock", min_stock)?;
        }
        Ok(())
    }

    /// Validate and turn into a stored item with a fresh id.
    pub fn into_item(self) -> Result<InventoryItem, ValidationError> {
        self.validate()?;
        let now = Utc::now();
        Ok(InventoryItem {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            category: self.category.filter(|c| !c.trim().is_empty()),
            price: self.price,
            min_stock: self.min_stock,
            created_at: now,
            updated_at: now,
        })
    }
}

impl InventoryPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            check_text("name", name)?;
        }
        if let Some(unit) = &self.unit {
            check_text("unit", unit)?;
        }
        if let Some(quantity) = self.quantity {
            check_non_negative("quantity", quantity)?;
        }
        if let Some(price) = self.price {
            check_non_negative("price", price)?;
        }
        if let Some(min_stock) = self.min_stock {
            check_non_negative("min_stock", min_stock)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && self.unit.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.min_stock.is_none()
    }
}

impl InventoryItem {
    /// Apply a validated patch in place and bump `updated_at`.
    pub fn apply_patch(&mut self, patch: &InventoryPatch) -> Result<(), ValidationError> {
        patch.validate()?;
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.trim().to_string();
        }
        if let Some(category) = &patch.category {
            self.category = Some(category.clone()).filter(|c| !c.trim().is_empty());
        }
        if let Some(price) = patch.price {
            self.price = Some(price);
        }
        if let Some(min_stock) = patch.min_stock {
            self.min_stock = Some(min_stock);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
