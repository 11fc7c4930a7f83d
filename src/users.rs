use crate::auth::{current_user_id, require_user};
use crate::config::Config;
use crate::database::UserDb;
use crate::error::ApiError;
use crate::model::User;
use crate::pagination::{paginate, Page};
use crate::relations::RelationDb;
use crate::validation;
use crate::views::{AuthorView, CreatedUserView, UserView};
use crate::Db;
use actix_identity::Identity;
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct RegisterParams {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

pub async fn register(
    params: web::Json<RegisterParams>,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    validation::username(&params.username)?;
    validation::email(&params.email)?;
    validation::required_text(&params.first_name, "first_name", validation::MAX_LENGTH_NAME)?;
    validation::required_text(&params.last_name, "last_name", validation::MAX_LENGTH_NAME)?;
    validation::password(&params.password, &params.username)?;
    if db.username_taken(&params.username)? {
        return Err(ApiError::validation("Такой username уже зарегистрирован."));
    }
    if db.email_taken(&params.email)? {
        return Err(ApiError::validation("Такой email уже зарегистрирован."));
    }
    let user = User {
        username: params.username,
        email: params.email,
        first_name: params.first_name,
        last_name: params.last_name,
        password_hash: bcrypt::hash(&params.password, config.bcrypt_cost)?,
        avatar: None,
    };
    // Lost a race against a concurrent registration.
    let id = db
        .add_user(&user)?
        .ok_or_else(|| ApiError::validation("Пользователь с такими данными уже существует."))?;
    info!("Registered user {} ({})", id, user.username);
    Ok(HttpResponse::Created().json(CreatedUserView {
        id,
        username: user.username,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
    }))
}

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
    recipes_limit: Option<String>,
}

impl PageQuery {
    /// Unparseable or zero limits mean "no limit".
    fn recipes_limit(&self) -> Option<usize> {
        self.recipes_limit
            .as_deref()
            .and_then(|limit| limit.parse().ok())
            .filter(|limit| *limit > 0)
    }
}

pub async fn list(
    req: HttpRequest,
    query: web::Query<PageQuery>,
    id: Identity,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let viewer = current_user_id(&id, &db)?;
    let page = paginate(
        db.list_users()?,
        query.page,
        query.limit,
        config.page_size,
        &config.base_url,
        &req,
    )?;
    let results = page
        .results
        .iter()
        .map(|(user_id, user)| UserView::build(&db, *user_id, user, viewer))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HttpResponse::Ok().json(Page {
        count: page.count,
        next: page.next,
        previous: page.previous,
        results,
    }))
}

pub async fn retrieve(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let viewer = current_user_id(&id, &db)?;
    let user = db.get_user(user_id)?.ok_or_else(ApiError::not_found)?;
    Ok(HttpResponse::Ok().json(UserView::build(&db, user_id, &user, viewer)?))
}

pub async fn me(id: Identity, db: Db) -> Result<HttpResponse, ApiError> {
    let (user_id, user) = require_user(&id, &db)?;
    Ok(HttpResponse::Ok().json(UserView::build(&db, user_id, &user, Some(user_id))?))
}

#[derive(Deserialize)]
pub struct SetPasswordParams {
    current_password: Option<String>,
    new_password: Option<String>,
}

pub async fn set_password(
    params: web::Json<SetPasswordParams>,
    id: Identity,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, mut user) = require_user(&id, &db)?;
    let (current, new) = match (&params.current_password, &params.new_password) {
        (Some(current), Some(new)) if !current.is_empty() && !new.is_empty() => (current, new),
        _ => {
            return Err(ApiError::validation(
                "Поля 'current_password' и 'new_password' обязательны.",
            ))
        }
    };
    if !bcrypt::verify(current, &user.password_hash)? {
        return Err(ApiError::validation("Текущий пароль указан неверно."));
    }
    if current == new {
        return Err(ApiError::validation(
            "Новый пароль не должен совпадать с текущим.",
        ));
    }
    validation::password(new, &user.username)?;
    user.password_hash = bcrypt::hash(new, config.bcrypt_cost)?;
    db.update_user(user_id, &user)?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct AvatarParams {
    avatar: Option<String>,
}

#[derive(Serialize)]
struct AvatarView {
    avatar: String,
}

pub async fn set_avatar(
    params: web::Json<AvatarParams>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let (user_id, mut user) = require_user(&id, &db)?;
    let avatar = match params.into_inner().avatar {
        Some(avatar) if !avatar.is_empty() => avatar,
        _ => return Err(ApiError::validation("Поле 'avatar' обязательно.")),
    };
    validation::image(&avatar)?;
    user.avatar = Some(avatar.clone());
    db.update_user(user_id, &user)?;
    Ok(HttpResponse::Ok().json(AvatarView { avatar }))
}

pub async fn delete_avatar(id: Identity, db: Db) -> Result<HttpResponse, ApiError> {
    let (user_id, mut user) = require_user(&id, &db)?;
    if user.avatar.take().is_none() {
        return Err(ApiError::validation("Аватар отсутствует."));
    }
    db.update_user(user_id, &user)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn subscribe(
    path: web::Path<u64>,
    query: web::Query<PageQuery>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    let author_id = path.into_inner();
    let author = db.get_user(author_id)?.ok_or_else(ApiError::not_found)?;
    if author_id == user_id {
        return Err(ApiError::validation(
            "Вы не можете подписаться на самого себя.",
        ));
    }
    if !db.subscribe(user_id, author_id)? {
        return Err(ApiError::Conflict(
            "Вы уже подписаны на этого пользователя.".to_owned(),
        ));
    }
    let view = AuthorView::build(&db, author_id, &author, Some(user_id), query.recipes_limit())?;
    Ok(HttpResponse::Created().json(view))
}

pub async fn unsubscribe(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    let author_id = path.into_inner();
    db.get_user(author_id)?.ok_or_else(ApiError::not_found)?;
    if !db.unsubscribe(user_id, author_id)? {
        return Err(ApiError::NotPresent(
            "Вы не подписаны на этого пользователя.".to_owned(),
        ));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Serialize)]
struct StatusView {
    status: &'static str,
}

/// Unconditional variant of [`unsubscribe`].
pub async fn drop_subscription(
    path: web::Path<u64>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    let author_id = path.into_inner();
    db.get_user(author_id)?.ok_or_else(ApiError::not_found)?;
    db.unsubscribe(user_id, author_id)?;
    Ok(HttpResponse::Ok().json(StatusView {
        status: "unsubscribed",
    }))
}

pub async fn subscriptions(
    req: HttpRequest,
    query: web::Query<PageQuery>,
    id: Identity,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _user) = require_user(&id, &db)?;
    let mut authors = Vec::new();
    for author_id in db.subscriptions(user_id)? {
        if let Some(author) = db.get_user(author_id)? {
            authors.push((author_id, author));
        }
    }
    authors.sort_by(|(_, a), (_, b)| a.email.cmp(&b.email));
    let page = paginate(
        authors,
        query.page,
        query.limit,
        config.page_size,
        &config.base_url,
        &req,
    )?;
    let results = page
        .results
        .iter()
        .map(|(author_id, author)| {
            AuthorView::build(&db, *author_id, author, Some(user_id), query.recipes_limit())
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HttpResponse::Ok().json(Page {
        count: page.count,
        next: page.next,
        previous: page.previous,
        results,
    }))
}
