//! Shopping list export: every ingredient of every recipe in a user's cart,
//! grouped by exact `(name, measurement_unit)` and summed.

use crate::database::{DbError, IngredientDb, RecipeDb};
use crate::error::ApiError;
use crate::model::Ingredient;
use crate::relations::{Relation, RelationDb};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tera::{Context, Tera};

pub const TEMPLATE_NAME: &str = "shopping_list.txt";
pub const FILENAME: &str = "shopping_list.txt";

const TEMPLATE: &str = "Список покупок:\n\
{% for line in lines %}\n{{ line.name }} ({{ line.measurement_unit }}) — {{ line.total_amount }}{% endfor %}";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AggregatedLine {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: u64,
}

/// Sums amounts per `(name, measurement_unit)`. Keys are compared verbatim, so
/// "Flour" and "flour" stay apart. Lines come out sorted by name, then unit.
pub fn aggregate<'a, I>(items: I) -> Vec<AggregatedLine>
where
    I: IntoIterator<Item = (&'a Ingredient, u32)>,
{
    let mut totals: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for (ingredient, amount) in items {
        *totals
            .entry((ingredient.name.as_str(), ingredient.measurement_unit.as_str()))
            .or_insert(0) += u64::from(amount);
    }
    totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| AggregatedLine {
            name: name.to_owned(),
            measurement_unit: measurement_unit.to_owned(),
            total_amount,
        })
        .collect()
}

/// Aggregated lines for everything in the user's cart.
pub fn for_user(db: &sled::Db, user_id: u64) -> Result<Vec<AggregatedLine>, ApiError> {
    let mut ingredients: HashMap<u64, Ingredient> = HashMap::new();
    let mut amounts = Vec::new();
    let mut resolved = 0;
    for recipe_id in db.related_recipes(Relation::ShoppingCart, user_id)? {
        // Cart entries can outlive a concurrently deleted recipe.
        let recipe = match db.get_recipe(recipe_id)? {
            Some(recipe) => recipe,
            None => continue,
        };
        resolved += 1;
        for item in recipe.ingredients {
            if !ingredients.contains_key(&item.ingredient_id) {
                let ingredient = db
                    .get_ingredient(item.ingredient_id)?
                    .ok_or(DbError::Dangling("ingredient", item.ingredient_id))?;
                ingredients.insert(item.ingredient_id, ingredient);
            }
            amounts.push((item.ingredient_id, item.amount));
        }
    }
    if resolved == 0 {
        return Err(ApiError::EmptyState("Корзина покупок пуста.".to_owned()));
    }
    Ok(aggregate(
        amounts
            .iter()
            .filter_map(|(id, amount)| ingredients.get(id).map(|ingredient| (ingredient, *amount))),
    ))
}

pub fn templates() -> tera::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
    Ok(tera)
}

pub fn render(tera: &Tera, lines: &[AggregatedLine]) -> tera::Result<String> {
    let mut ctx = Context::new();
    ctx.insert("lines", lines);
    tera.render(TEMPLATE_NAME, &ctx)
}
