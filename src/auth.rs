use crate::database::{TokenDb, UserDb};
use crate::error::ApiError;
use crate::model::User;
use crate::Db;
use actix_identity::{CookieIdentityPolicy, Identity, IdentityService};
use actix_web::{web, HttpResponse};
use log::debug;
use serde::{Deserialize, Serialize};

pub fn identity_service(key: &[u8]) -> IdentityService<CookieIdentityPolicy> {
    IdentityService::new(
        CookieIdentityPolicy::new(key)
            .name("auth-cookie")
            .secure(false),
    )
}

/// The session cookie carries an auth token; this resolves it to its user.
pub fn current_user(id: &Identity, db: &sled::Db) -> Result<Option<(u64, User)>, ApiError> {
    let token = match id.identity() {
        Some(token) => token,
        None => return Ok(None),
    };
    let user_id = match db.token_user(&token)? {
        Some(user_id) => user_id,
        None => {
            debug!("Revoked token presented");
            return Ok(None);
        }
    };
    Ok(db.get_user(user_id)?.map(|user| (user_id, user)))
}

pub fn current_user_id(id: &Identity, db: &sled::Db) -> Result<Option<u64>, ApiError> {
    Ok(current_user(id, db)?.map(|(user_id, _)| user_id))
}

pub fn require_user(id: &Identity, db: &sled::Db) -> Result<(u64, User), ApiError> {
    current_user(id, db)?.ok_or_else(ApiError::unauthenticated)
}

#[derive(Serialize, Deserialize)]
pub struct LoginParams {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct TokenView {
    auth_token: String,
}

pub async fn login(
    params: web::Json<LoginParams>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    if params.email.is_empty() || params.password.is_empty() {
        return Err(ApiError::validation("Требуется email и password"));
    }
    if let Some((user_id, user)) = db.get_user_by_email(&params.email)? {
        if bcrypt::verify(&params.password, &user.password_hash)? {
            let auth_token = db.issue_token(user_id)?;
            id.remember(auth_token.clone());
            return Ok(HttpResponse::Ok().json(TokenView { auth_token }));
        }
    }
    Err(ApiError::validation("Неверные учётные данные"))
}

pub async fn logout(id: Identity, db: Db) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    id.forget();
    if !db.revoke_token(user_id)? {
        return Err(ApiError::validation(
            "Токен для данного пользователя не найден.",
        ));
    }
    Ok(HttpResponse::NoContent().finish())
}
