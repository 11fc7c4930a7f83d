use crate::database::DbError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// The pair being added already exists.
    #[error("{0}")]
    Conflict(String),
    /// The pair being removed does not exist.
    #[error("{0}")]
    NotPresent(String),
    /// There is nothing to aggregate.
    #[error("{0}")]
    EmptyState(String),
    #[error("{0}")]
    Validation(String),
    #[error("Database error")]
    Database(#[from] DbError),
    #[error("Template error")]
    Template(#[from] tera::Error),
    #[error("Hashing error")]
    Hashing(#[from] bcrypt::BcryptError),
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        ApiError::Unauthenticated("Учетные данные не были предоставлены.".to_owned())
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("Страница не найдена.".to_owned())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        ApiError::Validation(message.into())
    }
}

impl From<sled::Error> for ApiError {
    fn from(err: sled::Error) -> Self {
        ApiError::Database(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_)
            | ApiError::NotPresent(_)
            | ApiError::EmptyState(_)
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Template(_) | ApiError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Database(err) => error!("{:?}", err),
            ApiError::Template(err) => error!("{:?}", err),
            ApiError::Hashing(err) => error!("{:?}", err),
            _ => {}
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let err = ApiError::Conflict("Рецепт уже в корзине.".to_owned());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Рецепт уже в корзине.");
        assert_eq!(ApiError::unauthenticated().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found().status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(DbError::MalformedKey(3));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Database error");
    }
}
