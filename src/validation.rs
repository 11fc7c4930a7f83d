use crate::error::ApiError;
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_LENGTH_USERNAME: usize = 150;
pub const MAX_LENGTH_NAME: usize = 150;
pub const MAX_LENGTH_EMAIL: usize = 254;
pub const MAX_LENGTH_RECIPE_NAME: usize = 256;
pub const MIN_PASSWORD_LEN: usize = 8;

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
    })
}

fn image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^data:image/[a-zA-Z0-9.+-]+;base64,[A-Za-z0-9+/=\s]+$")
            .expect("valid image pattern")
    })
}

/// Format and reserved-name checks. Uniqueness is the store's job.
pub fn username(value: &str) -> Result<(), ApiError> {
    if value.chars().count() > MAX_LENGTH_USERNAME {
        return Err(ApiError::validation(format!(
            "Username не может быть длиннее {} символов.",
            MAX_LENGTH_USERNAME
        )));
    }
    if !username_pattern().is_match(value) {
        return Err(ApiError::validation("Неверный формат username."));
    }
    if value.to_lowercase() == "me" {
        return Err(ApiError::validation(
            "Использовать 'me' как username запрещено.",
        ));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), ApiError> {
    if value.chars().count() > MAX_LENGTH_EMAIL || !email_pattern().is_match(value) {
        return Err(ApiError::validation("Введите правильный адрес электронной почты."));
    }
    Ok(())
}

/// Required, non-blank, bounded text field.
pub fn required_text(value: &str, field: &str, max_len: usize) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!(
            "Поле '{}' не может быть пустым.",
            field
        )));
    }
    if value.chars().count() > max_len {
        return Err(ApiError::validation(format!(
            "Поле '{}' не может быть длиннее {} символов.",
            field, max_len
        )));
    }
    Ok(())
}

pub fn password(value: &str, username: &str) -> Result<(), ApiError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "Пароль должен содержать не менее 8 символов.",
        ));
    }
    if value == username {
        return Err(ApiError::validation(
            "Пароль не должен совпадать с именем пользователя.",
        ));
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation(
            "Пароль не может состоять только из цифр.",
        ));
    }
    Ok(())
}

/// Accepts `data:image/<ext>;base64,<payload>`. The payload is stored as sent.
pub fn image(value: &str) -> Result<(), ApiError> {
    if !image_pattern().is_match(value) {
        return Err(ApiError::validation(
            "Загрузите изображение в формате base64.",
        ));
    }
    Ok(())
}
