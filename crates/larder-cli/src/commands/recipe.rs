//! Recipe commands, including cooking.

use clap::Subcommand;
use larder_core::{
    Catalog, ConsumptionEngine, IngredientRef, NewRecipe, RecipePatch, RecipeSeed,
};
use serde_json::json;

use super::{open_pantry, parse_ingredient, print_json, CommandResult};

#[derive(Subcommand)]
pub enum RecipeAction {
    /// Create a recipe from ingredients, or seed one from a raw material
    Create {
        /// Recipe title; defaults to the raw material's name with --from-material
        title: Option<String>,
        /// Copy ingredients from this raw material
        #[arg(long, conflicts_with = "ingredients")]
        from_material: Option<String>,
        /// Ingredient as <item_id>=<quantity>[:<unit>]; repeatable
        #[arg(long = "ingredient", value_parser = parse_ingredient)]
        ingredients: Vec<IngredientRef>,
        #[arg(long)]
        instructions: Option<String>,
        /// Cook time in minutes
        #[arg(long)]
        cook_time: Option<u32>,
        #[arg(long)]
        servings: Option<u32>,
    },
    /// List recipes
    List,
    /// Get recipe details
    Get {
        /// Recipe ID
        id: String,
    },
    /// Update a recipe
    Update {
        /// Recipe ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Replaces the whole ingredient list when given
        #[arg(long = "ingredient", value_parser = parse_ingredient)]
        ingredients: Vec<IngredientRef>,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long)]
        cook_time: Option<u32>,
        #[arg(long)]
        servings: Option<u32>,
    },
    /// Delete a recipe
    Delete {
        /// Recipe ID
        id: String,
    },
    /// Show missing stock for one recipe, or cookability of all recipes
    Check {
        /// Recipe ID
        id: Option<String>,
    },
    /// Cook a recipe, deducting its ingredients from stock
    Cook {
        /// Recipe ID
        id: String,
    },
}

pub fn run(action: RecipeAction) -> CommandResult {
    let (config, db) = open_pantry()?;
    let catalog = Catalog::new(&db);

    match action {
        RecipeAction::Create {
            title,
            from_material,
            ingredients,
            instructions,
            cook_time,
            servings,
        } => {
            let recipe = match from_material {
                Some(material_id) => catalog.create_recipe_from_raw_material(
                    &material_id,
                    RecipeSeed {
                        title,
                        instructions,
                        cook_time,
                        servings,
                    },
                )?,
                None => catalog.create_recipe(NewRecipe {
                    title: title.ok_or("a title is required without --from-material")?,
                    instructions,
                    cook_time,
                    servings,
                    ingredients,
                })?,
            };
            print_json(&recipe)?;
        }
        RecipeAction::List => print_json(&catalog.list_recipes()?)?,
        RecipeAction::Get { id } => print_json(&catalog.get_recipe(&id)?)?,
        RecipeAction::Update {
            id,
            title,
            ingredients,
            instructions,
            cook_time,
            servings,
        } => {
            let patch = RecipePatch {
                title,
                instructions,
                cook_time,
                servings,
                ingredients: (!ingredients.is_empty()).then_some(ingredients),
            };
            print_json(&catalog.update_recipe(&id, patch)?)?;
        }
        RecipeAction::Delete { id } => {
            catalog.delete_recipe(&id)?;
            println!("Recipe deleted: {id}");
        }
        RecipeAction::Check { id: Some(id) } => {
            let deficits = ConsumptionEngine::new(&db).check(&id)?;
            print_json(&json!({
                "recipe_id": id,
                "can_cook": deficits.is_empty(),
                "deficits": deficits,
            }))?;
        }
        RecipeAction::Check { id: None } => print_json(&catalog.recipe_availability()?)?,
        RecipeAction::Cook { id } => {
            let receipt = ConsumptionEngine::with_config(&db, &config.cook).cook(&id)?;
            print_json(&receipt)?;
        }
    }
    Ok(())
}
