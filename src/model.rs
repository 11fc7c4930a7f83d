use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeIngredient {
    pub ingredient_id: u64,
    pub amount: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Recipe {
    pub author_id: u64,
    pub name: String,
    /// Base64 data URL as uploaded.
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
    pub ingredients: Vec<RecipeIngredient>,
    pub created_at: DateTime<Utc>,
}
