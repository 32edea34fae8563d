//! The cook transaction.
//!
//! `Requested -> Validating -> {Committing -> Committed} | Rejected`. Deficits
//! found while validating or committing short-circuit before any item changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::error::CoreError;
use crate::inventory::{DeltaMap, DeltaOutcome, InventoryStore, Shortfall, StockChange};
use crate::stock::{find_deficits, requirements, Deficit};
use crate::storage::CookConfig;

/// Where a cook request currently stands. Logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CookPhase {
    Requested,
    Validating,
    Committing,
    Committed,
    Rejected,
}

/// Why a cook did not commit. No inventory change happened in any of these cases.
#[derive(Error, Debug)]
pub enum CookError {
    #[error("Recipe '{0}' not found")]
    NotFound(String),

    #[error("Insufficient stock for {} ingredient(s): {}", .0.len(), describe_deficits(.0))]
    InsufficientStock(Vec<Deficit>),

    /// Stock kept changing between snapshot and commit on every attempt.
    #[error("Stock changed during cook on {attempts} attempt(s); nothing was deducted")]
    Conflict {
        attempts: u32,
        shortfalls: Vec<Shortfall>,
    },

    #[error(transparent)]
    Store(#[from] CoreError),
}

fn describe_deficits(deficits: &[Deficit]) -> String {
    deficits
        .iter()
        .map(|d| {
            let name = d.name.as_deref().unwrap_or("<deleted item>");
            format!("{name} ({}) needs {}, has {}", d.item_id, d.required, d.available)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// What a committed cook deducted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookReceipt {
    pub recipe_id: String,
    pub title: String,
    /// Signed deltas that were committed (negative per consumed item).
    pub consumed: DeltaMap,
    pub changes: Vec<StockChange>,
    /// 1 when the first commit succeeded.
    pub attempts: u32,
    pub cooked_at: DateTime<Utc>,
}

/// Verifies and deducts a recipe's ingredients as one transaction.
pub struct ConsumptionEngine<'a, S: ?Sized> {
    store: &'a S,
    max_retries: u32,
}

impl<'a, S> ConsumptionEngine<'a, S>
where
    S: InventoryStore + CatalogStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self::with_config(store, &CookConfig::default())
    }

    pub fn with_config(store: &'a S, config: &CookConfig) -> Self {
        Self {
            store,
            max_retries: config.max_retries,
        }
    }

    /// Cook a recipe: snapshot, check, then commit all deductions or none.
    ///
    /// A commit-time rejection after a passing snapshot means another writer got
    /// there first; the whole check is retried up to `max_retries` times.
    pub fn cook(&self, recipe_id: &str) -> Result<CookReceipt, CookError> {
        debug!(recipe_id, phase = ?CookPhase::Requested, "cook");
        let Some(recipe) = self.store.get_recipe(recipe_id)? else {
            debug!(recipe_id, phase = ?CookPhase::Rejected, "recipe not found");
            return Err(CookError::NotFound(recipe_id.to_string()));
        };

        let required = requirements(&recipe.ingredients);
        let ids: Vec<&str> = required.keys().map(String::as_str).collect();
        let deltas: DeltaMap = required
            .iter()
            .map(|(item_id, quantity)| (item_id.clone(), -quantity))
            .collect();

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(recipe_id, attempts, phase = ?CookPhase::Validating, "cook");
            let snapshot = self.store.snapshot(&ids)?;
            let deficits = find_deficits(&required, &snapshot);
            if !deficits.is_empty() {
                warn!(
                    recipe_id,
                    title = %recipe.title,
                    deficits = deficits.len(),
                    "cook rejected: insufficient stock"
                );
                return Err(CookError::InsufficientStock(deficits));
            }

            debug!(recipe_id, attempts, phase = ?CookPhase::Committing, "cook");
            match self.store.apply_deltas(&deltas)? {
                DeltaOutcome::Committed(changes) => {
                    info!(
                        recipe_id,
                        title = %recipe.title,
                        items = changes.len(),
                        attempts,
                        "recipe cooked"
                    );
                    return Ok(CookReceipt {
                        recipe_id: recipe.id.clone(),
                        title: recipe.title.clone(),
                        consumed: deltas,
                        changes,
                        attempts,
                        cooked_at: Utc::now(),
                    });
                }
                DeltaOutcome::Insufficient(shortfalls) => {
                    warn!(
                        recipe_id,
                        attempts,
                        shortfalls = shortfalls.len(),
                        "stock changed between snapshot and commit"
                    );
                    if attempts > self.max_retries {
                        debug!(recipe_id, phase = ?CookPhase::Rejected, "cook");
                        return Err(CookError::Conflict {
                            attempts,
                            shortfalls,
                        });
                    }
                }
            }
        }
    }

    /// Check a recipe against one fresh snapshot without changing anything.
    pub fn check(&self, recipe_id: &str) -> Result<Vec<Deficit>, CookError> {
        let Some(recipe) = self.store.get_recipe(recipe_id)? else {
            return Err(CookError::NotFound(recipe_id.to_string()));
        };
        let required = requirements(&recipe.ingredients);
        let ids: Vec<&str> = required.keys().map(String::as_str).collect();
        let snapshot = self.store.snapshot(&ids)?;
        Ok(find_deficits(&required, &snapshot))
    }
}
