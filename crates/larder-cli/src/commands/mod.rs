pub mod config;
pub mod item;
pub mod material;
pub mod recipe;

use larder_core::{Config, IngredientRef, PantryDb};
use serde::Serialize;
use tracing::debug;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load config (writing defaults on first run) and open the pantry with it.
pub fn open_pantry() -> Result<(Config, PantryDb), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    debug!(busy_timeout_ms = config.database.busy_timeout_ms, "opening pantry");
    let db = PantryDb::open(&config.database)?;
    Ok((config, db))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `<item_id>=<quantity>[:<unit>]`.
pub fn parse_ingredient(raw: &str) -> Result<IngredientRef, String> {
    let (item_id, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <item_id>=<quantity>[:<unit>], got '{raw}'"))?;
    let (quantity, unit) = match rest.split_once(':') {
        Some((quantity, unit)) => (quantity, Some(unit.trim().to_string())),
        None => (rest, None),
    };
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity '{quantity}' in '{raw}'"))?;
    Ok(IngredientRef {
        item_id: item_id.trim().to_string(),
        quantity,
        unit: unit.filter(|u| !u.is_empty()),
    })
}
