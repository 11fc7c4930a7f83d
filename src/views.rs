//! JSON representations returned by the API.

use crate::database::{DbError, DbResult, IngredientDb, RecipeDb, UserDb};
use crate::model::*;
use crate::relations::{Relation, RelationDb};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct UserView {
    pub id: u64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl UserView {
    /// `viewer` is the authenticated caller, if any.
    pub fn build(db: &sled::Db, id: u64, user: &User, viewer: Option<u64>) -> DbResult<Self> {
        let is_subscribed = match viewer {
            Some(viewer) => db.is_subscribed(viewer, id)?,
            None => false,
        };
        Ok(UserView {
            id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            is_subscribed,
            avatar: user.avatar.clone(),
        })
    }
}

/// Returned on registration.
#[derive(Serialize, Debug)]
pub struct CreatedUserView {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize, Debug)]
pub struct IngredientView {
    pub id: u64,
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientView {
    pub fn new(id: u64, ingredient: Ingredient) -> Self {
        IngredientView {
            id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct IngredientAmountView {
    pub id: u64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

#[derive(Serialize, Debug)]
pub struct RecipeShortView {
    pub id: u64,
    pub name: String,
    pub image: String,
    pub cooking_time: u32,
}

impl RecipeShortView {
    pub fn new(id: u64, recipe: &Recipe) -> Self {
        RecipeShortView {
            id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RecipeView {
    pub id: u64,
    pub author: UserView,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub ingredients: Vec<IngredientAmountView>,
    pub created_at: DateTime<Utc>,
}

impl RecipeView {
    pub fn build(db: &sled::Db, id: u64, recipe: Recipe, viewer: Option<u64>) -> DbResult<Self> {
        let author = db
            .get_user(recipe.author_id)?
            .ok_or(DbError::Dangling("user", recipe.author_id))?;
        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(viewer) => (
                db.has_relation(Relation::Favorite, viewer, id)?,
                db.has_relation(Relation::ShoppingCart, viewer, id)?,
            ),
            None => (false, false),
        };
        let ingredients = recipe
            .ingredients
            .iter()
            .map(|item| -> DbResult<IngredientAmountView> {
                let ingredient = db
                    .get_ingredient(item.ingredient_id)?
                    .ok_or(DbError::Dangling("ingredient", item.ingredient_id))?;
                Ok(IngredientAmountView {
                    id: item.ingredient_id,
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                    amount: item.amount,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(RecipeView {
            id,
            author: UserView::build(db, recipe.author_id, &author, viewer)?,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            is_favorited,
            is_in_shopping_cart,
            ingredients,
            created_at: recipe.created_at,
        })
    }
}

/// An author as seen from the subscriptions pages.
#[derive(Serialize, Debug)]
pub struct AuthorView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes_count: usize,
    pub recipes: Vec<RecipeShortView>,
}

impl AuthorView {
    /// `recipes_limit` caps the embedded recipe list, not `recipes_count`.
    pub fn build(
        db: &sled::Db,
        id: u64,
        author: &User,
        viewer: Option<u64>,
        recipes_limit: Option<usize>,
    ) -> DbResult<Self> {
        let recipes = db.recipes_by_author(id)?;
        let recipes_count = recipes.len();
        let recipes = recipes
            .iter()
            .take(recipes_limit.unwrap_or(recipes_count))
            .map(|(recipe_id, recipe)| RecipeShortView::new(*recipe_id, recipe))
            .collect();
        Ok(AuthorView {
            user: UserView::build(db, id, author, viewer)?,
            recipes_count,
            recipes,
        })
    }
}
