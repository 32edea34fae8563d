//! Database schema migrations for larder.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use tracing::{debug, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .optional()
    .unwrap_or_else(|e| {
        warn!("failed to read schema_version: {e}");
        None
    })
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: items, raw materials, recipes.
///
/// Ingredient rows carry no foreign key to `inventory_items`: deleting an item
/// leaves the reference dangling, and cooking reports it as missing stock.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS inventory_items (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            quantity    REAL NOT NULL CHECK (quantity >= 0),
            unit        TEXT NOT NULL,
            category    TEXT,
            price       REAL,
            min_stock   REAL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_materials (
            id          TEXT PRIMARY KEY,
            recipe_name TEXT NOT NULL,
            variation   TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_material_ingredients (
            raw_material_id TEXT NOT NULL,
            position        INTEGER NOT NULL,
            item_id         TEXT NOT NULL,
            quantity        REAL NOT NULL,
            PRIMARY KEY (raw_material_id, position)
        );

        CREATE TABLE IF NOT EXISTS recipes (
            id           TEXT PRIMARY KEY,
            title        TEXT NOT NULL,
            instructions TEXT,
            cook_time    INTEGER,
            servings     INTEGER,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id TEXT NOT NULL,
            position  INTEGER NOT NULL,
            item_id   TEXT NOT NULL,
            quantity  REAL NOT NULL,
            unit      TEXT,
            PRIMARY KEY (recipe_id, position)
        );",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    debug!("applied schema migration v1");
    Ok(())
}

/// Migration v2: indexes for reference lookups and sorted listings.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_inventory_items_name ON inventory_items(name);
         CREATE INDEX IF NOT EXISTS idx_raw_material_ingredients_item ON raw_material_ingredients(item_id);
         CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_item ON recipe_ingredients(item_id);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    debug!("applied schema migration v2");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn quantity_check_constraint_rejects_negative() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO inventory_items (id, name, quantity, unit, created_at, updated_at)
             VALUES ('x', 'salt', -1, 'g', '', '')",
            [],
        );
        assert!(result.is_err());
    }
}
