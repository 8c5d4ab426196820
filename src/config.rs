use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use thiserror::Error;

use crate::constants::DEFAULT_PAGE_SIZE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub secret_key: String,
    pub token_ttl_hours: i64,
    pub media_root: PathBuf,
    pub page_size: i64,
    pub max_upload_bytes: u64,
    pub max_json_bytes: u64,
    pub db_max_connections: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database_url: require(&lookup, "DATABASE_URL")?,
            bind_addr: try_load(&lookup, "BIND_ADDR", "127.0.0.1:8000")?,
            secret_key: require(&lookup, "SECRET_KEY")?,
            token_ttl_hours: try_load(&lookup, "TOKEN_TTL_HOURS", "24")?,
            media_root: try_load(&lookup, "MEDIA_ROOT", "./media")?,
            page_size: try_load(&lookup, "PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?,
            max_upload_bytes: try_load(&lookup, "MAX_UPLOAD_BYTES", "5242880")?,
            max_json_bytes: try_load(&lookup, "MAX_JSON_BYTES", "2621440")?,
            db_max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", "5")?,
        };

        if config.token_ttl_hours <= 0 {
            return Err(invalid("TOKEN_TTL_HOURS", "must be positive"));
        }
        if config.page_size <= 0 {
            return Err(invalid("PAGE_SIZE", "must be positive"));
        }
        if config.max_json_bytes == 0 {
            return Err(invalid("MAX_JSON_BYTES", "must be positive"));
        }
        if config.db_max_connections == 0 {
            return Err(invalid("DB_MAX_CONNECTIONS", "must be positive"));
        }
        Ok(config)
    }
}

fn invalid(key: &'static str, message: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.to_string(),
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| invalid(key, e))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/recipes"),
        ("SECRET_KEY", "secret"),
    ];

    #[test]
    fn defaults_fill_optional_values() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.media_root, PathBuf::from("./media"));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_json_bytes, 2_621_440);
        assert_eq!(config.db_max_connections, 5);
    }

    #[test]
    fn secret_key_is_required() {
        let result = load(&[("DATABASE_URL", "postgres://localhost/recipes")]);
        assert!(matches!(result, Err(ConfigError::Missing("SECRET_KEY"))));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("BIND_ADDR", "not an address"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("PAGE_SIZE", "0"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key: "PAGE_SIZE", .. })
        ));
    }
}
