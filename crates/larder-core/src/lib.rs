//! # Larder Core Library
//!
//! Core logic for a kitchen inventory: stock-tracked items, reusable raw
//! material templates, recipes, and the cook transaction that deducts a
//! recipe's ingredients from stock all at once or not at all.
//!
//! The `larder` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Inventory**: item records plus the [`InventoryStore`] seam with its
//!   snapshot and atomic delta operations
//! - **Stock**: pure evaluation of low-stock status and ingredient deficits
//! - **Catalog**: raw materials and recipes, validated against the inventory
//! - **Cook**: [`ConsumptionEngine`], the check-then-commit transaction with
//!   bounded retry on concurrent modification
//! - **Storage**: SQLite ([`PantryDb`]) and in-memory ([`MemoryPantry`])
//!   backends, and TOML configuration
//!
//! ## Key Components
//!
//! - [`ConsumptionEngine`]: cooks recipes
//! - [`Catalog`]: raw material and recipe management
//! - [`PantryDb`]: persistent store
//! - [`Config`]: application configuration management

pub mod catalog;
pub mod cook;
pub mod error;
pub mod inventory;
pub mod stock;
pub mod storage;

pub use catalog::{
    Catalog, CatalogStore, IngredientStock, ItemDeletion, NewRawMaterial, NewRecipe, RawMaterial,
    RawMaterialPatch, RawMaterialStock, Recipe, RecipeAvailability, RecipePatch, RecipeSeed,
};
pub use cook::{ConsumptionEngine, CookError, CookPhase, CookReceipt};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use inventory::{
    DeltaMap, DeltaOutcome, IngredientRef, InventoryItem, InventoryPatch, InventoryStore,
    NewInventoryItem, Shortfall, StockChange, StockSnapshot,
};
pub use stock::{Deficit, LowStockEntry, MinStockTable};
pub use storage::{Config, CookConfig, DatabaseConfig, MemoryPantry, PantryDb, StockConfig};
