use crate::auth::{current_user, current_user_id, require_user};
use crate::config::Config;
use crate::database::{IngredientDb, RecipeDb};
use crate::error::ApiError;
use crate::model::{Recipe, RecipeIngredient};
use crate::pagination::paginate;
use crate::relations::{Relation, RelationDb};
use crate::shopping_list;
use crate::validation;
use crate::views::{RecipeShortView, RecipeView};
use crate::Db;
use actix_identity::Identity;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Deserialize)]
pub struct RecipeFilter {
    page: Option<usize>,
    limit: Option<usize>,
    author: Option<u64>,
    is_favorited: Option<String>,
    is_in_shopping_cart: Option<String>,
}

/// Applies an `is_favorited`-style flag: `"1"` keeps members, anything else drops them.
fn membership_filter(
    db: &sled::Db,
    recipes: &mut Vec<(u64, Recipe)>,
    relation: Relation,
    user_id: u64,
    flag: &str,
) -> Result<(), ApiError> {
    let members: HashSet<u64> = db.related_recipes(relation, user_id)?.into_iter().collect();
    let keep = flag == "1";
    recipes.retain(|(id, _)| members.contains(id) == keep);
    Ok(())
}

pub async fn list(
    req: HttpRequest,
    query: web::Query<RecipeFilter>,
    id: Identity,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let viewer = current_user_id(&id, &db)?;
    let mut recipes = db.list_recipes()?;
    if let Some(author) = query.author {
        recipes.retain(|(_, recipe)| recipe.author_id == author);
    }
    if let Some(viewer) = viewer {
        if let Some(flag) = &query.is_favorited {
            membership_filter(&db, &mut recipes, Relation::Favorite, viewer, flag)?;
        }
        if let Some(flag) = &query.is_in_shopping_cart {
            membership_filter(&db, &mut recipes, Relation::ShoppingCart, viewer, flag)?;
        }
    }
    let page = paginate(
        recipes,
        query.page,
        query.limit,
        config.page_size,
        &config.base_url,
        &req,
    )?;
    let results = page
        .results
        .into_iter()
        .map(|(recipe_id, recipe)| RecipeView::build(&db, recipe_id, recipe, viewer))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HttpResponse::Ok().json(crate::pagination::Page {
        count: page.count,
        next: page.next,
        previous: page.previous,
        results,
    }))
}

#[derive(Deserialize)]
pub struct IngredientAmount {
    id: u64,
    amount: i64,
}

#[derive(Deserialize)]
pub struct RecipeParams {
    #[serde(default)]
    ingredients: Vec<IngredientAmount>,
    image: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    text: String,
    cooking_time: i64,
}

impl RecipeParams {
    /// Checks the payload and resolves it into stored ingredient amounts.
    fn validate(&self, db: &sled::Db) -> Result<Vec<RecipeIngredient>, ApiError> {
        validation::required_text(&self.name, "name", validation::MAX_LENGTH_RECIPE_NAME)?;
        validation::required_text(&self.text, "text", usize::MAX)?;
        if self.cooking_time < 1 || self.cooking_time > i64::from(u32::MAX) {
            return Err(ApiError::validation(
                "Время приготовления должно быть не меньше 1 минуты.",
            ));
        }
        if let Some(image) = &self.image {
            validation::image(image)?;
        }
        if self.ingredients.is_empty() {
            return Err(ApiError::validation(
                "Нужно указать хотя бы один ингредиент.",
            ));
        }
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.ingredients.len());
        for item in &self.ingredients {
            if !seen.insert(item.id) {
                return Err(ApiError::validation("Ингредиенты не должны повторяться."));
            }
            if item.amount < 1 || item.amount > i64::from(u32::MAX) {
                return Err(ApiError::validation(
                    "Количество ингредиента должно быть не меньше 1.",
                ));
            }
            if db.get_ingredient(item.id)?.is_none() {
                return Err(ApiError::validation(format!(
                    "Ингредиент с id {} не существует.",
                    item.id
                )));
            }
            resolved.push(RecipeIngredient {
                ingredient_id: item.id,
                amount: item.amount as u32,
            });
        }
        Ok(resolved)
    }
}

pub async fn create(
    params: web::Json<RecipeParams>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    let ingredients = params.validate(&db)?;
    let params = params.into_inner();
    let image = params
        .image
        .ok_or_else(|| ApiError::validation("Поле 'image' обязательно."))?;
    let recipe = Recipe {
        author_id: user_id,
        name: params.name,
        image,
        text: params.text,
        cooking_time: params.cooking_time as u32,
        ingredients,
        created_at: Utc::now(),
    };
    let recipe_id = db.add_recipe(&recipe)?;
    info!("User {} created recipe {}", user_id, recipe_id);
    Ok(HttpResponse::Created().json(RecipeView::build(&db, recipe_id, recipe, Some(user_id))?))
}

pub async fn retrieve(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = path.into_inner();
    let viewer = current_user_id(&id, &db)?;
    let recipe = db.get_recipe(recipe_id)?.ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(RecipeView::build(&db, recipe_id, recipe, viewer)?))
}

pub async fn update(
    path: web::Path<u64>,
    params: web::Json<RecipeParams>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    let recipe_id = path.into_inner();
    let mut recipe = db.get_recipe(recipe_id)?.ok_or_else(ApiError::not_found)?;
    if recipe.author_id != user_id {
        return Err(ApiError::Forbidden(
            "У вас нет разрешения на редактирование рецепта.".to_owned(),
        ));
    }
    let ingredients = params.validate(&db)?;
    let params = params.into_inner();
    recipe.name = params.name;
    recipe.text = params.text;
    recipe.cooking_time = params.cooking_time as u32;
    recipe.ingredients = ingredients;
    if let Some(image) = params.image {
        recipe.image = image;
    }
    db.update_recipe(recipe_id, &recipe)?;
    Ok(HttpResponse::Ok().json(RecipeView::build(&db, recipe_id, recipe, Some(user_id))?))
}

pub async fn delete(path: web::Path<u64>, id: Identity, db: Db) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    let recipe_id = path.into_inner();
    let recipe = db.get_recipe(recipe_id)?.ok_or_else(ApiError::not_found)?;
    if recipe.author_id != user_id {
        return Err(ApiError::Forbidden(
            "Вы не можете удалить чужой рецепт.".to_owned(),
        ));
    }
    db.delete_recipe(recipe_id)?;
    info!("User {} deleted recipe {}", user_id, recipe_id);
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Serialize)]
struct ShortLinkView {
    #[serde(rename = "short-link")]
    short_link: String,
}

pub async fn get_link(
    path: web::Path<u64>,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = path.into_inner();
    db.get_recipe(recipe_id)?.ok_or_else(ApiError::not_found)?;
    let code = db.short_link(recipe_id)?;
    Ok(HttpResponse::Ok().json(ShortLinkView {
        short_link: format!("{}/s/{}", config.base_url, code),
    }))
}

pub async fn follow_link(
    path: web::Path<String>,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = db
        .resolve_short_link(&path)?
        .ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Found()
        .insert_header(("location", format!("{}/recipes/{}", config.base_url, recipe_id)))
        .finish())
}

struct RelationMessages {
    present: &'static str,
    absent: &'static str,
}

fn messages(relation: Relation) -> RelationMessages {
    match relation {
        Relation::Favorite => RelationMessages {
            present: "Рецепт уже добавлен в избранное.",
            absent: "Этот рецепт отсутствует в избранном.",
        },
        Relation::ShoppingCart => RelationMessages {
            present: "Рецепт уже добавлен в корзину.",
            absent: "Этот рецепт отсутствует в корзине.",
        },
    }
}

fn link_recipe(
    db: &sled::Db,
    id: &Identity,
    recipe_id: u64,
    relation: Relation,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(id, db)?;
    let recipe = db.get_recipe(recipe_id)?.ok_or_else(ApiError::not_found)?;
    if !db.add_relation(relation, user_id, recipe_id)? {
        return Err(ApiError::Conflict(messages(relation).present.to_owned()));
    }
    Ok(HttpResponse::Created().json(RecipeShortView::new(recipe_id, &recipe)))
}

fn unlink_recipe(
    db: &sled::Db,
    id: &Identity,
    recipe_id: u64,
    relation: Relation,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(id, db)?;
    // A pair left behind by a deleted recipe can still be cleared.
    if db.remove_relation(relation, user_id, recipe_id)? {
        return Ok(HttpResponse::NoContent().finish());
    }
    db.get_recipe(recipe_id)?.ok_or_else(ApiError::not_found)?;
    Err(ApiError::NotPresent(messages(relation).absent.to_owned()))
}

pub async fn add_favorite(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    link_recipe(&db, &id, path.into_inner(), Relation::Favorite)
}

pub async fn remove_favorite(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    unlink_recipe(&db, &id, path.into_inner(), Relation::Favorite)
}

pub async fn add_to_cart(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    link_recipe(&db, &id, path.into_inner(), Relation::ShoppingCart)
}

pub async fn remove_from_cart(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    unlink_recipe(&db, &id, path.into_inner(), Relation::ShoppingCart)
}

pub async fn download_shopping_cart(
    id: Identity,
    db: Db,
    tera: web::Data<tera::Tera>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = current_user(&id, &db)?
        .ok_or_else(|| ApiError::Unauthenticated("Необходима авторизация.".to_owned()))?;
    let lines = shopping_list::for_user(&db, user_id)?;
    let body = shopping_list::render(&tera, &lines)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(
                shopping_list::FILENAME.to_owned(),
            )],
        })
        .body(body))
}
