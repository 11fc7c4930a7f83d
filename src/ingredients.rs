use crate::database::{IngredientDb, DbError};
use crate::error::ApiError;
use crate::model::Ingredient;
use crate::views::IngredientView;
use crate::Db;
use actix_web::{web, HttpResponse};
use log::info;
use serde::Deserialize;
use std::io::Read;
use thiserror::Error;

#[derive(Deserialize)]
pub struct IngredientFilter {
    name: Option<String>,
}

pub async fn list(query: web::Query<IngredientFilter>, db: Db) -> Result<HttpResponse, ApiError> {
    let prefix = query.name.as_deref().filter(|name| !name.is_empty());
    let ingredients: Vec<_> = db
        .search_ingredients(prefix)?
        .into_iter()
        .map(|(id, ingredient)| IngredientView::new(id, ingredient))
        .collect();
    Ok(HttpResponse::Ok().json(ingredients))
}

pub async fn retrieve(path: web::Path<u64>, db: Db) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let ingredient = db.get_ingredient(id)?.ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(IngredientView::new(id, ingredient)))
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read ingredient fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed ingredient fixture: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Seeds the catalog from a JSON array of `{name, measurement_unit}` objects.
/// Does nothing if the catalog already has entries. Returns the number added.
pub fn load_fixture<R: Read>(db: &sled::Db, reader: R) -> Result<usize, FixtureError> {
    if db.has_ingredients()? {
        info!("Ingredient catalog already populated, skipping fixture");
        return Ok(0);
    }
    let ingredients: Vec<Ingredient> = serde_json::from_reader(reader)?;
    for ingredient in &ingredients {
        db.add_ingredient(ingredient)?;
    }
    info!("Loaded {} ingredients", ingredients.len());
    Ok(ingredients.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use actix_web::http::StatusCode;
    use actix_web::test::{call_and_read_body_json, call_service, TestRequest};
    use serde_json::Value;

    const FIXTURE: &str = r#"[
        {"name": "мука", "measurement_unit": "г"},
        {"name": "молоко", "measurement_unit": "мл"},
        {"name": "яйца", "measurement_unit": "шт."}
    ]"#;

    #[test]
    fn fixture_is_loaded_once() {
        let db = temporary_db();
        assert_eq!(load_fixture(&db, FIXTURE.as_bytes()).unwrap(), 3);
        assert_eq!(load_fixture(&db, FIXTURE.as_bytes()).unwrap(), 0);
        assert_eq!(db.search_ingredients(None).unwrap().len(), 3);
    }

    #[test]
    fn malformed_fixture_is_an_error() {
        let db = temporary_db();
        match load_fixture(&db, &b"{\"name\": 1}"[..]) {
            Err(FixtureError::Json(_)) => {}
            other => panic!("expected a JSON error, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn list_filters_by_name_prefix() {
        let db = temporary_db();
        load_fixture(&db, FIXTURE.as_bytes()).unwrap();
        let app = test_app!(db);

        let req = TestRequest::get()
            .uri("/api/ingredients/?name=%D0%BC%D0%BE")
            .to_request();
        let body: Value = call_and_read_body_json(&app, req).await;
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["молоко"]);

        let req = TestRequest::get().uri("/api/ingredients/").to_request();
        let body: Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(body[0]["name"], "молоко");
    }

    #[actix_rt::test]
    async fn retrieve_unknown_ingredient_is_not_found() {
        let db = temporary_db();
        let app = test_app!(db);
        let req = TestRequest::get()
            .uri("/api/ingredients/42/")
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
