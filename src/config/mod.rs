use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::validation::ValidationLimits;

pub mod cors;
pub mod headers;

pub use cors::create_cors_layer;
pub use headers::create_api_headers_layer;

/// Upper bound on rows fetched per store round trip.
const MAX_SCAN_PAGE_SIZE: usize = 10_000;

const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:3000,http://localhost:8080,http://127.0.0.1:3000,http://127.0.0.1:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Postgres => f.write_str("postgres"),
            StoreKind::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub database_url: String,
    pub table_name: String,
    pub timeout: Duration,
    pub max_connections: u32,
    pub scan_page_size: usize,
}

impl StoreConfig {
    /// `database_url` with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.database_url.split_once("://") else {
            return self.database_url.clone();
        };
        match rest.split_once('@') {
            Some((credentials, host)) => {
                let user = credentials.split(':').next().unwrap_or_default();
                format!("{}://{}:***@{}", scheme, user, host)
            }
            None => self.database_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_title: String,
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    pub cors_allowed_origins: Vec<String>,
    pub limits: ValidationLimits,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let kind = match text("EVENTS_STORE", "postgres").to_lowercase().as_str() {
            "postgres" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => {
                return Err(ConfigError::invalid(
                    "EVENTS_STORE",
                    other,
                    "expected 'postgres' or 'memory'",
                ))
            }
        };

        let table_name = text("EVENTS_TABLE_NAME", "events");
        if !is_plain_identifier(&table_name) {
            return Err(ConfigError::invalid(
                "EVENTS_TABLE_NAME",
                &table_name,
                "must start with a letter or underscore and contain only letters, digits and underscores",
            ));
        }

        let scan_page_size = positive(&lookup, "SCAN_PAGE_SIZE", 100)?;
        if scan_page_size > MAX_SCAN_PAGE_SIZE {
            return Err(ConfigError::invalid(
                "SCAN_PAGE_SIZE",
                scan_page_size,
                format!("cannot exceed {}", MAX_SCAN_PAGE_SIZE),
            ));
        }

        let limits = ValidationLimits {
            max_title_length: positive(&lookup, "MAX_TITLE_LENGTH", 200)?,
            max_description_length: positive(&lookup, "MAX_DESCRIPTION_LENGTH", 1000)?,
            max_location_length: positive(&lookup, "MAX_LOCATION_LENGTH", 200)?,
            max_organizer_length: positive(&lookup, "MAX_ORGANIZER_LENGTH", 100)?,
            min_capacity: positive(&lookup, "MIN_CAPACITY", 1)?,
            max_capacity: positive(&lookup, "MAX_CAPACITY", 100_000)?,
        };
        if limits.min_capacity > limits.max_capacity {
            return Err(ConfigError::invalid(
                "MIN_CAPACITY",
                limits.min_capacity,
                format!("exceeds MAX_CAPACITY ({})", limits.max_capacity),
            ));
        }
        if limits.max_capacity > i64::from(u32::MAX) {
            return Err(ConfigError::invalid(
                "MAX_CAPACITY",
                limits.max_capacity,
                "too large",
            ));
        }

        Ok(Self {
            api_title: text("API_TITLE", "Events API"),
            host: text("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 8000)?,
            store: StoreConfig {
                kind,
                database_url: text("DATABASE_URL", "postgres://localhost/events"),
                table_name,
                timeout: Duration::from_millis(positive(&lookup, "STORE_TIMEOUT_MS", 5000)?),
                max_connections: positive(&lookup, "STORE_MAX_CONNECTIONS", 5)?,
                scan_page_size,
            },
            cors_allowed_origins: split_list(&text("CORS_ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)),
            limits,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid("HOST", &self.host, e.to_string())
            })
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn positive<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default + fmt::Display,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let value = parse(lookup, key, default)?;
    if value <= T::default() {
        return Err(ConfigError::invalid(key, value, "must be greater than zero"));
    }
    Ok(value)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
