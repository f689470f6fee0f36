use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/bandstage";
const DEV_AUTH_SECRET: &str = "default-secret-key-for-development-only-min-16-chars";
const DEFAULT_ISSUER: &str = "bandstage";
const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const DEFAULT_HOLD_MINUTES: i64 = 10;

const TOKEN_TTL_HOURS: RangeInclusive<i64> = 1..=8760;
const HOLD_MINUTES: RangeInclusive<i64> = 1..=1440;
const SWEEP_INTERVAL_SECS: RangeInclusive<u64> = 1..=3600;
const DB_CONNECTIONS: RangeInclusive<u32> = 1..=100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub store_backend: StoreBackend,
    pub auth_secret: String,
    pub auth_issuer: String,
    pub auth_token_ttl_hours: i64,
    /// OAuth client credentials; only stored for account linking.
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub order_hold_minutes: i64,
    pub hold_sweep_interval_secs: u64,
    pub bind_addr: SocketAddr,
    pub production: bool,
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    /// Every setting has a fallback, so a missing variable never aborts startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let auth_secret = get("AUTH_SECRET").unwrap_or_else(|| {
            tracing::warn!("AUTH_SECRET is not set; using the development secret");
            DEV_AUTH_SECRET.to_string()
        });

        let store_backend = match get("STORE").as_deref() {
            Some("memory") => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        };

        let host = parse_or(get("SERVER_HOST"), "SERVER_HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = parse_or(get("SERVER_PORT"), "SERVER_PORT", DEFAULT_PORT);

        Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            db_max_connections: parse_in(
                get("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                5,
                DB_CONNECTIONS,
            ),
            store_backend,
            auth_secret,
            auth_issuer: get("AUTH_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            auth_token_ttl_hours: parse_in(
                get("AUTH_TOKEN_TTL_HOURS"),
                "AUTH_TOKEN_TTL_HOURS",
                DEFAULT_TOKEN_TTL_HOURS,
                TOKEN_TTL_HOURS,
            ),
            google_client_id: get("AUTH_GOOGLE_ID"),
            google_client_secret: get("AUTH_GOOGLE_SECRET"),
            order_hold_minutes: parse_in(
                get("ORDER_HOLD_MINUTES"),
                "ORDER_HOLD_MINUTES",
                DEFAULT_HOLD_MINUTES,
                HOLD_MINUTES,
            ),
            hold_sweep_interval_secs: parse_in(
                get("HOLD_SWEEP_INTERVAL_SECS"),
                "HOLD_SWEEP_INTERVAL_SECS",
                30,
                SWEEP_INTERVAL_SECS,
            ),
            bind_addr: SocketAddr::new(host, port),
            production: get("RUST_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
        }
    }

    pub fn hold_window(&self) -> Duration {
        Duration::try_minutes(self.order_hold_minutes)
            .filter(|window| *window > Duration::zero())
            .unwrap_or_else(|| Duration::minutes(DEFAULT_HOLD_MINUTES))
    }

    pub fn oauth_configured(&self) -> bool {
        self.google_client_id.is_some() && self.google_client_secret.is_some()
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Invalid setting, using default");
            default
        }),
    }
}

/// Like [`parse_or`], but values outside `range` also fall back.
fn parse_in<T>(raw: Option<String>, key: &str, default: T, range: RangeInclusive<T>) -> T
where
    T: FromStr + PartialOrd + Display + Copy,
{
    let value = parse_or(raw, key, default);
    if range.contains(&value) {
        return value;
    }
    tracing::warn!(
        key,
        value = %value,
        min = %range.start(),
        max = %range.end(),
        "Setting out of range, using default"
    );
    default
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config(&[]);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.auth_secret, DEV_AUTH_SECRET);
        assert_eq!(config.order_hold_minutes, 10);
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert!(!config.production);
        assert!(!config.oauth_configured());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let unparsable = config(&[("ORDER_HOLD_MINUTES", "soon"), ("SERVER_PORT", "-1")]);
        assert_eq!(unparsable.order_hold_minutes, 10);
        assert_eq!(unparsable.bind_addr.port(), 3001);

        let out_of_range = config(&[
            ("ORDER_HOLD_MINUTES", "-5"),
            ("AUTH_TOKEN_TTL_HOURS", "9999999999999999"),
            ("HOLD_SWEEP_INTERVAL_SECS", "0"),
            ("DB_MAX_CONNECTIONS", "0"),
        ]);
        assert_eq!(out_of_range.order_hold_minutes, 10);
        assert_eq!(out_of_range.hold_window(), Duration::minutes(10));
        assert_eq!(out_of_range.auth_token_ttl_hours, DEFAULT_TOKEN_TTL_HOURS);
        assert_eq!(out_of_range.hold_sweep_interval_secs, 30);
        assert_eq!(out_of_range.db_max_connections, 5);
    }

    #[test]
    fn test_range_edges_are_accepted() {
        let config = config(&[("ORDER_HOLD_MINUTES", "1440"), ("AUTH_TOKEN_TTL_HOURS", "1")]);
        assert_eq!(config.hold_window(), Duration::minutes(1440));
        assert_eq!(config.auth_token_ttl_hours, 1);
    }

    #[test]
    fn test_hold_window_never_goes_negative() {
        let mut config = config(&[]);
        config.order_hold_minutes = -5;
        assert_eq!(config.hold_window(), Duration::minutes(10));
        config.order_hold_minutes = i64::MAX;
        assert_eq!(config.hold_window(), Duration::minutes(10));
    }

    #[test]
    fn test_values_are_read() {
        let config = config(&[
            ("DATABASE_URL", "postgres://db/tickets"),
            ("ORDER_HOLD_MINUTES", "15"),
            ("RUST_ENV", "Production"),
            ("STORE", "memory"),
            ("AUTH_GOOGLE_ID", "id"),
            ("AUTH_GOOGLE_SECRET", "secret"),
        ]);
        assert_eq!(config.database_url, "postgres://db/tickets");
        assert_eq!(config.hold_window(), Duration::minutes(15));
        assert!(config.production);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.oauth_configured());
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = config(&[("AUTH_SECRET", "   ")]);
        assert_eq!(config.auth_secret, DEV_AUTH_SECRET);
    }
}
