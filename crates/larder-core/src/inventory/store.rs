//! The inventory persistence contract.

use super::{DeltaMap, DeltaOutcome, InventoryItem, InventoryPatch, NewInventoryItem, StockSnapshot};
use crate::error::Result;

/// Authoritative record of stock items and quantities.
///
/// Implementations must route `update_item`, `delete_item` and `apply_deltas`
/// through one serialization point so a manual edit can never interleave with
/// a delta commit on the same item.
pub trait InventoryStore {
    fn get_item(&self, id: &str) -> Result<Option<InventoryItem>>;

    /// All items, sorted by name.
    fn list_items(&self) -> Result<Vec<InventoryItem>>;

    /// Validate, assign an id, and persist.
    fn create_item(&self, item: NewInventoryItem) -> Result<InventoryItem>;

    /// Manual edit. Returns `None` if the item does not exist.
    fn update_item(&self, id: &str, patch: &InventoryPatch) -> Result<Option<InventoryItem>>;

    /// Returns `false` if the item does not exist.
    fn delete_item(&self, id: &str) -> Result<bool>;

    /// One atomic read of the given items.
    fn snapshot(&self, ids: &[&str]) -> Result<StockSnapshot>;

    /// Commit every delta or none of them.
    ///
    /// Resulting quantities are recomputed against live state at commit time.
    fn apply_deltas(&self, deltas: &DeltaMap) -> Result<DeltaOutcome>;
}
