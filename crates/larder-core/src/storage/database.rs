//! SQLite-based storage for inventory items, raw materials, and recipes.
//!
//! All writes that touch quantities run inside `BEGIN IMMEDIATE` transactions,
//! so every connection to the same database file serializes on SQLite's write
//! lock. Within one process the connection is additionally guarded by a mutex.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{data_dir, migrations, DatabaseConfig};
use crate::catalog::{CatalogStore, RawMaterial, Recipe};
use crate::error::{DatabaseError, Result};
use crate::inventory::{
    resolve_delta, validate_deltas, DeltaMap, DeltaOutcome, IngredientRef, InventoryItem,
    InventoryPatch, InventoryStore, NewInventoryItem, StockSnapshot,
};

const ITEM_COLUMNS: &str =
    "id, name, quantity, unit, category, price, min_stock, created_at, updated_at";

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_item(row: &rusqlite::Row) -> Result<InventoryItem, rusqlite::Error> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(InventoryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        unit: row.get(3)?,
        category: row.get(4)?,
        price: row.get(5)?,
        min_stock: row.get(6)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

/// SQLite database holding the whole pantry.
pub struct PantryDb {
    conn: Mutex<Connection>,
}

impl PantryDb {
    /// Open the database at `<data dir>/larder.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let path = data_dir()?.join("larder.db");
        Self::open_at(&path, config)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn, config)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, &DatabaseConfig::default())
    }

    fn from_connection(conn: Connection, config: &DatabaseConfig) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` inside `BEGIN IMMEDIATE`, committing on `Ok` and rolling back on `Err`.
    fn write_tx<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn();
        conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match f(&*conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT;")?;
                Ok(value)
            }
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    fn load_item(conn: &Connection, id: &str) -> Result<Option<InventoryItem>> {
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = ?1"),
                params![id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn load_ingredients(conn: &Connection, table: &str, owner_column: &str, owner_id: &str) -> Result<Vec<IngredientRef>> {
        let unit_column = if table == "recipe_ingredients" { "unit" } else { "NULL" };
        let mut stmt = conn.prepare(&format!(
            "SELECT item_id, quantity, {unit_column} FROM {table}
             WHERE {owner_column} = ?1 ORDER BY position"
        ))?;
        let rows = stmt.query_map(params![owner_id], |row| {
            Ok(IngredientRef {
                item_id: row.get(0)?,
                quantity: row.get(1)?,
                unit: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn write_ingredients(
        conn: &Connection,
        table: &str,
        owner_column: &str,
        owner_id: &str,
        ingredients: &[IngredientRef],
    ) -> Result<()> {
        conn.execute(
            &format!("DELETE FROM {table} WHERE {owner_column} = ?1"),
            params![owner_id],
        )?;
        for (position, ingredient) in ingredients.iter().enumerate() {
            if table == "recipe_ingredients" {
                conn.execute(
                    "INSERT INTO recipe_ingredients (recipe_id, position, item_id, quantity, unit)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        owner_id,
                        position as i64,
                        ingredient.item_id,
                        ingredient.quantity,
                        ingredient.unit,
                    ],
                )?;
            } else {
                conn.execute(
                    "INSERT INTO raw_material_ingredients (raw_material_id, position, item_id, quantity)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![owner_id, position as i64, ingredient.item_id, ingredient.quantity],
                )?;
            }
        }
        Ok(())
    }

    fn load_raw_material(conn: &Connection, id: &str) -> Result<Option<RawMaterial>> {
        let row = conn
            .query_row(
                "SELECT id, recipe_name, variation, created_at, updated_at
                 FROM raw_materials WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, recipe_name, variation, created_at, updated_at)) = row else {
            return Ok(None);
        };
        let ingredients =
            Self::load_ingredients(conn, "raw_material_ingredients", "raw_material_id", &id)?;
        Ok(Some(RawMaterial {
            id,
            recipe_name,
            variation,
            ingredients,
            created_at: parse_datetime_fallback(&created_at),
            updated_at: parse_datetime_fallback(&updated_at),
        }))
    }

    fn load_recipe(conn: &Connection, id: &str) -> Result<Option<Recipe>> {
        let row = conn
            .query_row(
                "SELECT id, title, instructions, cook_time, servings, created_at, updated_at
                 FROM recipes WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<u32>>(3)?,
                        row.get::<_, Option<u32>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, title, instructions, cook_time, servings, created_at, updated_at)) = row
        else {
            return Ok(None);
        };
        let ingredients = Self::load_ingredients(conn, "recipe_ingredients", "recipe_id", &id)?;
        Ok(Some(Recipe {
            id,
            title,
            instructions,
            cook_time,
            servings,
            ingredients,
            created_at: parse_datetime_fallback(&created_at),
            updated_at: parse_datetime_fallback(&updated_at),
        }))
    }

    fn list_ids(conn: &Connection, sql: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl InventoryStore for PantryDb {
    fn get_item(&self, id: &str) -> Result<Option<InventoryItem>> {
        Self::load_item(&self.conn(), id)
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY name, id"
        ))?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn create_item(&self, item: NewInventoryItem) -> Result<InventoryItem> {
        let item = item.into_item()?;
        self.conn().execute(
            "INSERT INTO inventory_items (id, name, quantity, unit, category, price, min_stock, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id,
                item.name,
                item.quantity,
                item.unit,
                item.category,
                item.price,
                item.min_stock,
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
            ],
        )?;
        info!(id = %item.id, name = %item.name, quantity = item.quantity, "inventory item created");
        Ok(item)
    }

    fn update_item(&self, id: &str, patch: &InventoryPatch) -> Result<Option<InventoryItem>> {
        patch.validate()?;
        self.write_tx(|conn| {
            let Some(mut item) = Self::load_item(conn, id)? else {
                return Ok(None);
            };
            item.apply_patch(patch)?;
            conn.execute(
                "UPDATE inventory_items
                 SET name = ?2, quantity = ?3, unit = ?4, category = ?5, price = ?6, min_stock = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    item.id,
                    item.name,
                    item.quantity,
                    item.unit,
                    item.category,
                    item.price,
                    item.min_stock,
                    item.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(Some(item))
        })
    }

    fn delete_item(&self, id: &str) -> Result<bool> {
        self.write_tx(|conn| {
            let deleted = conn.execute("DELETE FROM inventory_items WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
    }

    fn snapshot(&self, ids: &[&str]) -> Result<StockSnapshot> {
        let mut ids: Vec<&str> = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(StockSnapshot::default());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id IN ({placeholders})"
        ))?;
        let items = stmt
            .query_map(params_from_iter(ids.iter()), row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StockSnapshot::from_items(items))
    }

    fn apply_deltas(&self, deltas: &DeltaMap) -> Result<DeltaOutcome> {
        validate_deltas(deltas)?;
        self.write_tx(|conn| {
            let mut changes = Vec::with_capacity(deltas.len());
            let mut shortfalls = Vec::new();
            for (item_id, &delta) in deltas {
                let current: Option<f64> = conn
                    .query_row(
                        "SELECT quantity FROM inventory_items WHERE id = ?1",
                        params![item_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match resolve_delta(item_id, current, delta) {
                    Ok(change) => changes.push(change),
                    Err(shortfall) => shortfalls.push(shortfall),
                }
            }
            if !shortfalls.is_empty() {
                debug!(count = shortfalls.len(), "delta batch rejected");
                return Ok(DeltaOutcome::Insufficient(shortfalls));
            }

            let now = Utc::now().to_rfc3339();
            for change in &changes {
                conn.execute(
                    "UPDATE inventory_items SET quantity = ?2, updated_at = ?3 WHERE id = ?1",
                    params![change.item_id, change.after, now],
                )?;
            }
            Ok(DeltaOutcome::Committed(changes))
        })
    }
}

impl CatalogStore for PantryDb {
    fn get_raw_material(&self, id: &str) -> Result<Option<RawMaterial>> {
        Self::load_raw_material(&self.conn(), id)
    }

    fn list_raw_materials(&self) -> Result<Vec<RawMaterial>> {
        let conn = self.conn();
        let ids = Self::list_ids(&conn, "SELECT id FROM raw_materials ORDER BY recipe_name, id")?;
        let mut raw_materials = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(raw_material) = Self::load_raw_material(&conn, &id)? {
                raw_materials.push(raw_material);
            }
        }
        Ok(raw_materials)
    }

    fn insert_raw_material(&self, raw_material: &RawMaterial) -> Result<()> {
        self.write_tx(|conn| {
            conn.execute(
                "INSERT INTO raw_materials (id, recipe_name, variation, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    raw_material.id,
                    raw_material.recipe_name,
                    raw_material.variation,
                    raw_material.created_at.to_rfc3339(),
                    raw_material.updated_at.to_rfc3339(),
                ],
            )?;
            Self::write_ingredients(
                conn,
                "raw_material_ingredients",
                "raw_material_id",
                &raw_material.id,
                &raw_material.ingredients,
            )
        })
    }

    fn replace_raw_material(&self, raw_material: &RawMaterial) -> Result<bool> {
        self.write_tx(|conn| {
            let updated = conn.execute(
                "UPDATE raw_materials SET recipe_name = ?2, variation = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    raw_material.id,
                    raw_material.recipe_name,
                    raw_material.variation,
                    raw_material.updated_at.to_rfc3339(),
                ],
            )?;
            if updated == 0 {
                return Ok(false);
            }
            Self::write_ingredients(
                conn,
                "raw_material_ingredients",
                "raw_material_id",
                &raw_material.id,
                &raw_material.ingredients,
            )?;
            Ok(true)
        })
    }

    fn delete_raw_material(&self, id: &str) -> Result<bool> {
        self.write_tx(|conn| {
            conn.execute(
                "DELETE FROM raw_material_ingredients WHERE raw_material_id = ?1",
                params![id],
            )?;
            let deleted = conn.execute("DELETE FROM raw_materials WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
    }

    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        Self::load_recipe(&self.conn(), id)
    }

    fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let conn = self.conn();
        let ids = Self::list_ids(&conn, "SELECT id FROM recipes ORDER BY title, id")?;
        let mut recipes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(recipe) = Self::load_recipe(&conn, &id)? {
                recipes.push(recipe);
            }
        }
        Ok(recipes)
    }

    fn insert_recipe(&self, recipe: &Recipe) -> Result<()> {
        self.write_tx(|conn| {
            conn.execute(
                "INSERT INTO recipes (id, title, instructions, cook_time, servings, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    recipe.id,
                    recipe.title,
                    recipe.instructions,
                    recipe.cook_time,
                    recipe.servings,
                    recipe.created_at.to_rfc3339(),
                    recipe.updated_at.to_rfc3339(),
                ],
            )?;
            Self::write_ingredients(conn, "recipe_ingredients", "recipe_id", &recipe.id, &recipe.ingredients)
        })
    }

    fn replace_recipe(&self, recipe: &Recipe) -> Result<bool> {
        self.write_tx(|conn| {
            let updated = conn.execute(
                "UPDATE recipes
                 SET title = ?2, instructions = ?3, cook_time = ?4, servings = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    recipe.id,
                    recipe.title,
                    recipe.instructions,
                    recipe.cook_time,
                    recipe.servings,
                    recipe.updated_at.to_rfc3339(),
                ],
            )?;
            if updated == 0 {
                return Ok(false);
            }
            Self::write_ingredients(conn, "recipe_ingredients", "recipe_id", &recipe.id, &recipe.ingredients)?;
            Ok(true)
        })
    }

    fn delete_recipe(&self, id: &str) -> Result<bool> {
        self.write_tx(|conn| {
            conn.execute("DELETE FROM recipe_ingredients WHERE recipe_id = ?1", params![id])?;
            let deleted = conn.execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewRecipe;
    use crate::error::{CoreError, ValidationError};

    #[test]
    fn create_and_list_items_sorted_by_name() {
        let db = PantryDb::open_memory().unwrap();
        db.create_item(NewInventoryItem::new("sugar", 60.0, "g")).unwrap();
        db.create_item(NewInventoryItem::new("flour", 500.0, "g")).unwrap();
        let names: Vec<_> = db.list_items().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["flour", "sugar"]);
    }

    #[test]
    fn create_item_rejects_invalid_input() {
        let db = PantryDb::open_memory().unwrap();
        let err = db.create_item(NewInventoryItem::new("", 1.0, "g")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyField("name"))));
        assert!(db.list_items().unwrap().is_empty());
    }

    #[test]
    fn item_roundtrip_keeps_optional_fields() {
        let db = PantryDb::open_memory().unwrap();
        let mut new = NewInventoryItem::new("butter", 2.0, "kg");
        new.category = Some("dairy".into());
        new.price = Some(450.0);
        new.min_stock = Some(0.5);
        let created = db.create_item(new).unwrap();
        let loaded = db.get_item(&created.id).unwrap().unwrap();
        assert_eq!(loaded.category.as_deref(), Some("dairy"));
        assert_eq!(loaded.price, Some(450.0));
        assert_eq!(loaded.min_stock, Some(0.5));
    }

    #[test]
    fn update_and_delete_report_missing_items() {
        let db = PantryDb::open_memory().unwrap();
        let patch = InventoryPatch {
            price: Some(1.0),
            ..Default::default()
        };
        assert!(db.update_item("missing", &patch).unwrap().is_none());
        assert!(!db.delete_item("missing").unwrap());
    }

    #[test]
    fn update_item_persists_patch() {
        let db = PantryDb::open_memory().unwrap();
        let item = db.create_item(NewInventoryItem::new("rice", 3.0, "kg")).unwrap();
        let patch = InventoryPatch {
            quantity: Some(5.0),
            category: Some("grains".into()),
            ..Default::default()
        };
        db.update_item(&item.id, &patch).unwrap().unwrap();
        let loaded = db.get_item(&item.id).unwrap().unwrap();
        assert_eq!(loaded.quantity, 5.0);
        assert_eq!(loaded.category.as_deref(), Some("grains"));
    }

    #[test]
    fn snapshot_skips_missing_ids() {
        let db = PantryDb::open_memory().unwrap();
        let flour = db.create_item(NewInventoryItem::new("flour", 500.0, "g")).unwrap();
        let snapshot = db.snapshot(&[&flour.id, "gone", &flour.id]).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&flour.id));
        assert!(db.snapshot(&[]).unwrap().is_empty());
    }

    #[test]
    fn apply_deltas_is_all_or_nothing() {
        let db = PantryDb::open_memory().unwrap();
        let flour = db.create_item(NewInventoryItem::new("flour", 500.0, "g")).unwrap();
        let sugar = db.create_item(NewInventoryItem::new("sugar", 40.0, "g")).unwrap();

        let mut deltas = DeltaMap::new();
        deltas.insert(flour.id.clone(), -300.0);
        deltas.insert(sugar.id.clone(), -50.0);
        match db.apply_deltas(&deltas).unwrap() {
            DeltaOutcome::Insufficient(shortfalls) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].item_id, sugar.id);
                assert_eq!(shortfalls[0].shortfall, 10.0);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(db.get_item(&flour.id).unwrap().unwrap().quantity, 500.0);
        assert_eq!(db.get_item(&sugar.id).unwrap().unwrap().quantity, 40.0);

        deltas.insert(sugar.id.clone(), 10.0);
        assert!(db.apply_deltas(&deltas).unwrap().is_committed());
        assert_eq!(db.get_item(&flour.id).unwrap().unwrap().quantity, 200.0);
        assert_eq!(db.get_item(&sugar.id).unwrap().unwrap().quantity, 50.0);
    }

    #[test]
    fn recipe_roundtrip_preserves_ingredient_order() {
        let db = PantryDb::open_memory().unwrap();
        let recipe = Recipe::from_new(
            NewRecipe {
                title: "omelette".into(),
                cook_time: Some(10),
                servings: Some(1),
                ingredients: vec![
                    IngredientRef { item_id: "eggs".into(), quantity: 2.0, unit: Some("pcs".into()) },
                    IngredientRef::new("butter", 10.0),
                    IngredientRef::new("salt", 1.0),
                ],
                ..Default::default()
            },
            "r1".into(),
        );
        db.insert_recipe(&recipe).unwrap();
        let loaded = db.get_recipe("r1").unwrap().unwrap();
        let ids: Vec<_> = loaded.ingredients.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["eggs", "butter", "salt"]);
        assert_eq!(loaded.ingredients[0].unit.as_deref(), Some("pcs"));
        assert_eq!(loaded.cook_time, Some(10));

        assert!(db.delete_recipe("r1").unwrap());
        assert!(db.get_recipe("r1").unwrap().is_none());
        assert!(!db.replace_recipe(&recipe).unwrap());
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("larder.db");
        let id = {
            let db = PantryDb::open_at(&path, &DatabaseConfig::default()).unwrap();
            db.create_item(NewInventoryItem::new("oats", 1.5, "kg")).unwrap().id
        };
        let db = PantryDb::open_at(&path, &DatabaseConfig::default()).unwrap();
        assert_eq!(db.get_item(&id).unwrap().unwrap().quantity, 1.5);
    }

    #[test]
    fn non_finite_delta_is_rejected_without_change() {
        let db = PantryDb::open_memory().unwrap();
        let flour = db.create_item(NewInventoryItem::new("flour", 500.0, "g")).unwrap();
        let sugar = db.create_item(NewInventoryItem::new("sugar", 60.0, "g")).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let deltas = DeltaMap::from([(flour.id.clone(), -100.0), (sugar.id.clone(), bad)]);
            assert!(matches!(
                db.apply_deltas(&deltas),
                Err(CoreError::Validation(ValidationError::InvalidQuantity { field: "delta", .. }))
            ));
        }
        assert_eq!(db.get_item(&flour.id).unwrap().unwrap().quantity, 500.0);
        assert_eq!(db.get_item(&sugar.id).unwrap().unwrap().quantity, 60.0);
    }
}
