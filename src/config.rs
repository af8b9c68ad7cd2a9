use std::env;
use std::path::PathBuf;

use crate::error::AppError;

pub const DEV_JWT_SECRET: &str = "swift-deliver-dev-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub data_file: Option<PathBuf>,
    pub event_buffer_size: usize,
    pub seed_driver_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact or json"
                )));
            }
        };

        Ok(Self {
            http_port: parse_or_default(&lookup, "PORT", 5000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            jwt_secret: lookup("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
            token_ttl_hours: parse_or_default(&lookup, "TOKEN_TTL_HOURS", 168)?,
            data_file: lookup("DATA_FILE")
                .filter(|raw| !raw.trim().is_empty())
                .map(PathBuf::from),
            event_buffer_size: parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 1024)?,
            seed_driver_password: lookup("SEED_DRIVER_PASSWORD").filter(|raw| !raw.is_empty()),
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Config, LogFormat};

    fn config(vars: &[(&str, &str)]) -> Result<Config, crate::error::AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config(&[]).unwrap();

        assert_eq!(config.http_port, 5000);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.token_ttl_hours, 168);
        assert!(config.uses_dev_secret());
        assert!(config.data_file.is_none());
        assert!(config.seed_driver_password.is_none());
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = config(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "json"),
            ("JWT_SECRET", "s3cret"),
            ("DATA_FILE", "/tmp/deliveries.json"),
        ])
        .unwrap();

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.uses_dev_secret());
        assert_eq!(
            config.data_file.as_deref(),
            Some(std::path::Path::new("/tmp/deliveries.json"))
        );
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert!(config(&[("PORT", "not-a-port")]).is_err());
        assert!(config(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
