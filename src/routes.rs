use crate::error::ApiError;
use crate::{auth, ingredients, recipes, users};
use actix_web::web;
use log::debug;

/// Registers every endpoint. Literal segments (`me`, `subscriptions`,
/// `download_shopping_cart`) must be registered before their `{id}` siblings.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        debug!("Rejected JSON payload: {}", err);
        ApiError::validation(err.to_string()).into()
    }))
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::validation(err.to_string()).into()),
    )
    .app_data(web::PathConfig::default().error_handler(|_err, _req| ApiError::not_found().into()))
    .service(
        web::scope("/api")
            .route("/auth/token/login/", web::post().to(auth::login))
            .route("/auth/token/logout/", web::post().to(auth::logout))
            .service(
                web::resource("/users/")
                    .route(web::get().to(users::list))
                    .route(web::post().to(users::register)),
            )
            .route("/users/me/", web::get().to(users::me))
            .service(
                web::resource("/users/me/avatar/")
                    .route(web::put().to(users::set_avatar))
                    .route(web::delete().to(users::delete_avatar)),
            )
            .route("/users/set_password/", web::post().to(users::set_password))
            .route("/users/subscriptions/", web::get().to(users::subscriptions))
            .route("/users/{id}/", web::get().to(users::retrieve))
            .service(
                web::resource("/users/{id}/subscribe/")
                    .route(web::post().to(users::subscribe))
                    .route(web::delete().to(users::unsubscribe)),
            )
            .route(
                "/users/{id}/unsubscribe/",
                web::delete().to(users::drop_subscription),
            )
            .route("/ingredients/", web::get().to(ingredients::list))
            .route("/ingredients/{id}/", web::get().to(ingredients::retrieve))
            .service(
                web::resource("/recipes/")
                    .route(web::get().to(recipes::list))
                    .route(web::post().to(recipes::create)),
            )
            .route(
                "/recipes/download_shopping_cart/",
                web::get().to(recipes::download_shopping_cart),
            )
            .service(
                web::resource("/recipes/{id}/")
                    .route(web::get().to(recipes::retrieve))
                    .route(web::patch().to(recipes::update))
                    .route(web::delete().to(recipes::delete)),
            )
            .route("/recipes/{id}/get-link/", web::get().to(recipes::get_link))
            .service(
                web::resource("/recipes/{id}/favorite/")
                    .route(web::post().to(recipes::add_favorite))
                    .route(web::delete().to(recipes::remove_favorite)),
            )
            .service(
                web::resource("/recipes/{id}/shopping_cart/")
                    .route(web::post().to(recipes::add_to_cart))
                    .route(web::delete().to(recipes::remove_from_cart)),
            ),
    )
    .route("/s/{code}", web::get().to(recipes::follow_link));
}
