//! Raw material commands.

use clap::Subcommand;
use larder_core::{Catalog, IngredientRef, NewRawMaterial, RawMaterialPatch};

use super::{open_pantry, parse_ingredient, print_json, CommandResult};

#[derive(Subcommand)]
pub enum MaterialAction {
    /// Create a raw material
    Create {
        /// Name of the dish this template prepares
        recipe_name: String,
        #[arg(long)]
        variation: Option<String>,
        /// Ingredient as <item_id>=<quantity>; repeatable
        #[arg(long = "ingredient", required = true, value_parser = parse_ingredient)]
        ingredients: Vec<IngredientRef>,
    },
    /// List raw materials
    List,
    /// Get raw material details with per-ingredient stock status
    Get {
        /// Raw material ID
        id: String,
    },
    /// Update a raw material
    Update {
        /// Raw material ID
        id: String,
        #[arg(long)]
        recipe_name: Option<String>,
        #[arg(long)]
        variation: Option<String>,
        /// Replaces the whole ingredient list when given
        #[arg(long = "ingredient", value_parser = parse_ingredient)]
        ingredients: Vec<IngredientRef>,
    },
    /// Delete a raw material
    Delete {
        /// Raw material ID
        id: String,
    },
}

pub fn run(action: MaterialAction) -> CommandResult {
    let (config, db) = open_pantry()?;
    let catalog = Catalog::new(&db);

    match action {
        MaterialAction::Create {
            recipe_name,
            variation,
            ingredients,
        } => {
            let raw_material = catalog.create_raw_material(NewRawMaterial {
                recipe_name,
                variation,
                ingredients,
            })?;
            print_json(&raw_material)?;
        }
        MaterialAction::List => print_json(&catalog.list_raw_materials()?)?,
        MaterialAction::Get { id } => {
            print_json(&catalog.raw_material_stock(&id, &config.min_stock_table())?)?
        }
        MaterialAction::Update {
            id,
            recipe_name,
            variation,
            ingredients,
        } => {
            let patch = RawMaterialPatch {
                recipe_name,
                variation,
                ingredients: (!ingredients.is_empty()).then_some(ingredients),
            };
            print_json(&catalog.update_raw_material(&id, patch)?)?;
        }
        MaterialAction::Delete { id } => {
            catalog.delete_raw_material(&id)?;
            println!("Raw material deleted: {id}");
        }
    }
    Ok(())
}
