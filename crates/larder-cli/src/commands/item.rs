//! Inventory item commands.

use clap::Subcommand;
use larder_core::stock::low_stock_report;
use larder_core::{
    Catalog, CoreError, DeltaMap, DeltaOutcome, InventoryPatch, InventoryStore, NewInventoryItem,
};
use serde_json::json;

use super::{open_pantry, print_json, CommandResult};

#[derive(Subcommand)]
pub enum ItemAction {
    /// Add an inventory item
    Add {
        /// Item name
        name: String,
        /// Quantity on hand
        #[arg(long)]
        quantity: f64,
        /// Unit label (e.g. g, kg, ml, pcs)
        #[arg(long)]
        unit: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        /// Low-stock threshold; defaults by unit when omitted
        #[arg(long)]
        min_stock: Option<f64>,
    },
    /// List all items
    List,
    /// Get item details
    Get {
        /// Item ID
        id: String,
    },
    /// Edit an item
    Update {
        /// Item ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        quantity: Option<f64>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        min_stock: Option<f64>,
    },
    /// Delete an item; reports recipes and raw materials still referencing it
    Delete {
        /// Item ID
        id: String,
    },
    /// Add stock to an item
    Restock {
        /// Item ID
        id: String,
        /// Amount to add
        amount: f64,
    },
    /// List items at or below their minimum stock
    Low,
}

pub fn run(action: ItemAction) -> CommandResult {
    let (config, db) = open_pantry()?;

    match action {
        ItemAction::Add {
            name,
            quantity,
            unit,
            category,
            price,
            min_stock,
        } => {
            let item = db.create_item(NewInventoryItem {
                name,
                quantity,
                unit,
                category,
                price,
                min_stock,
            })?;
            print_json(&item)?;
        }
        ItemAction::List => {
            print_json(&db.list_items()?)?;
        }
        ItemAction::Get { id } => {
            let item = db
                .get_item(&id)?
                .ok_or_else(|| CoreError::not_found("inventory item", &id))?;
            print_json(&item)?;
        }
        ItemAction::Update {
            id,
            name,
            quantity,
            unit,
            category,
            price,
            min_stock,
        } => {
            let patch = InventoryPatch {
                name,
                quantity,
                unit,
                category,
                price,
                min_stock,
            };
            if patch.is_empty() {
                return Err("nothing to update".into());
            }
            let item = db
                .update_item(&id, &patch)?
                .ok_or_else(|| CoreError::not_found("inventory item", &id))?;
            print_json(&item)?;
        }
        ItemAction::Delete { id } => {
            let deletion = Catalog::new(&db).delete_item(&id)?;
            print_json(&deletion)?;
        }
        ItemAction::Restock { id, amount } => {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(format!("restock amount must be positive, got {amount}").into());
            }
            let deltas = DeltaMap::from([(id.clone(), amount)]);
            match db.apply_deltas(&deltas)? {
                DeltaOutcome::Committed(changes) => print_json(&changes)?,
                DeltaOutcome::Insufficient(_) => {
                    return Err(CoreError::not_found("inventory item", &id).into());
                }
            }
        }
        ItemAction::Low => {
            let items = db.list_items()?;
            let low = low_stock_report(&items, &config.min_stock_table());
            print_json(&json!({ "count": low.len(), "items": low }))?;
        }
    }
    Ok(())
}
