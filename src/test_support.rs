use crate::config::Config;
use crate::database::UserDb;
use crate::model::*;
use chrono::Utc;

pub const SECRET_KEY: [u8; 32] = [7u8; 32];
pub const PASSWORD: &str = "validPass123";

pub fn temporary_db() -> sled::Db {
    sled::Config::new().temporary(true).open().unwrap()
}

pub fn config() -> Config {
    Config {
        host: "127.0.0.1".to_owned(),
        port: 8080,
        database_path: None,
        secret_key: SECRET_KEY.to_vec(),
        base_url: "http://testserver".to_owned(),
        page_size: 6,
        bcrypt_cost: 4,
        ingredients_path: None,
    }
}

pub fn user(username: &str, email: &str) -> User {
    User {
        username: username.to_owned(),
        email: email.to_owned(),
        first_name: "Test".to_owned(),
        last_name: "User".to_owned(),
        password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
        avatar: None,
    }
}

pub fn add_user(db: &sled::Db, username: &str) -> u64 {
    db.add_user(&user(username, &format!("{}@example.com", username)))
        .unwrap()
        .unwrap()
}

pub fn ingredient(name: &str, unit: &str) -> Ingredient {
    Ingredient {
        name: name.to_owned(),
        measurement_unit: unit.to_owned(),
    }
}

pub fn recipe(author_id: u64, name: &str, ingredients: Vec<RecipeIngredient>) -> Recipe {
    Recipe {
        author_id,
        name: name.to_owned(),
        image: "data:image/png;base64,iVBORw0KGgo=".to_owned(),
        text: "Mix and bake.".to_owned(),
        cooking_time: 30,
        ingredients,
        created_at: Utc::now(),
    }
}

/// Initializes the full application over `$db`.
macro_rules! test_app {
    ($db:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(crate::auth::identity_service(
                    &crate::test_support::SECRET_KEY,
                ))
                .app_data(actix_web::web::Data::new($db.clone()))
                .app_data(actix_web::web::Data::new(crate::test_support::config()))
                .app_data(actix_web::web::Data::new(
                    crate::shopping_list::templates().unwrap(),
                ))
                .configure(crate::routes::configure),
        )
        .await
    };
}

/// Logs `$username` in (password [`PASSWORD`]) and yields the session cookie.
macro_rules! login {
    ($app:expr, $username:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/auth/token/login/")
            .set_json(&serde_json::json!({
                "email": format!("{}@example.com", $username),
                "password": crate::test_support::PASSWORD,
            }))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        resp.response()
            .cookies()
            .next()
            .expect("session cookie")
            .into_owned()
    }};
}
