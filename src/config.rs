use log::{info, warn};
use rand::RngCore;
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use thiserror::Error;

/// actix-identity refuses cookie keys shorter than this.
pub const MIN_SECRET_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("FOODGRAM_SECRET_KEY must be at least {} bytes", MIN_SECRET_KEY_LEN)]
    SecretKeyTooShort,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` opens a temporary database that is dropped on exit.
    pub database_path: Option<PathBuf>,
    pub secret_key: Vec<u8>,
    /// Public origin used when building absolute links.
    pub base_url: String,
    pub page_size: usize,
    pub bcrypt_cost: u32,
    pub ingredients_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: try_load("FOODGRAM_HOST", "127.0.0.1")?,
            port: try_load("FOODGRAM_PORT", "8080")?,
            database_path: optional("FOODGRAM_DATABASE_PATH").map(PathBuf::from),
            secret_key: secret_key()?,
            base_url: try_load::<String>("FOODGRAM_BASE_URL", "http://localhost:8080")?
                .trim_end_matches('/')
                .to_owned(),
            page_size: positive(try_load("FOODGRAM_PAGE_SIZE", "6")?, "FOODGRAM_PAGE_SIZE")?,
            bcrypt_cost: bcrypt_cost(try_load(
                "FOODGRAM_BCRYPT_COST",
                &bcrypt::DEFAULT_COST.to_string(),
            )?)?,
            ingredients_path: optional("FOODGRAM_INGREDIENTS").map(PathBuf::from),
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    optional(key)
        .unwrap_or_else(|| {
            info!("{} not set, using default: {}", key, default);
            default.to_owned()
        })
        .parse()
        .map_err(|err: T::Err| ConfigError::Invalid {
            key,
            message: err.to_string(),
        })
}

fn positive(value: usize, key: &'static str) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            message: "must be positive".to_owned(),
        });
    }
    Ok(value)
}

/// bcrypt rejects costs outside this range at hashing time.
const BCRYPT_COSTS: std::ops::RangeInclusive<u32> = 4..=31;

fn bcrypt_cost(value: u32) -> Result<u32, ConfigError> {
    if !BCRYPT_COSTS.contains(&value) {
        return Err(ConfigError::Invalid {
            key: "FOODGRAM_BCRYPT_COST",
            message: format!(
                "must be between {} and {}",
                BCRYPT_COSTS.start(),
                BCRYPT_COSTS.end()
            ),
        });
    }
    Ok(value)
}

fn secret_key() -> Result<Vec<u8>, ConfigError> {
    match optional("FOODGRAM_SECRET_KEY") {
        Some(key) if key.len() >= MIN_SECRET_KEY_LEN => Ok(key.into_bytes()),
        Some(_) => Err(ConfigError::SecretKeyTooShort),
        None => {
            warn!("FOODGRAM_SECRET_KEY not set, sessions will not survive a restart");
            let mut key = vec![0u8; MIN_SECRET_KEY_LEN];
            rand::thread_rng().fill_bytes(&mut key);
            Ok(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_page_size() {
        assert!(positive(0, "FOODGRAM_PAGE_SIZE").is_err());
        assert_eq!(positive(6, "FOODGRAM_PAGE_SIZE").unwrap(), 6);
    }

    #[test]
    fn rejects_bcrypt_cost_out_of_range() {
        assert!(bcrypt_cost(2).is_err());
        assert!(bcrypt_cost(40).is_err());
        assert_eq!(bcrypt_cost(4).unwrap(), 4);
        assert_eq!(bcrypt_cost(bcrypt::DEFAULT_COST).unwrap(), bcrypt::DEFAULT_COST);
        let err = bcrypt_cost(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid FOODGRAM_BCRYPT_COST value: must be between 4 and 31"
        );
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let port: u16 = try_load("FOODGRAM_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);
        let err = try_load::<u16>("FOODGRAM_TEST_UNSET_PORT", "not a port").unwrap_err();
        assert!(err.to_string().starts_with("invalid FOODGRAM_TEST_UNSET_PORT value"));
    }
}
