//! Runtime configuration.
//!
//! Everything is read once at startup from `TRUSTDESK_*` environment variables.
//! Missing or unparsable values fall back to the defaults below, so a bare
//! `cargo run` serves on `127.0.0.1:8080` with a local SQLite file and a
//! `./storage` directory.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "trustdesk.sqlite";
const DEFAULT_STORAGE_DIR: &str = "./storage";
const DEFAULT_FONTS_DIR: &str = "./fonts";
const DEFAULT_SIGNING_SECRET: &str = "trustdesk-dev-secret";
const DEFAULT_SCHEMA_TTL_SECS: u64 = 300;
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;
const DEFAULT_JSON_LIMIT_MB: usize = 10;
const DEFAULT_SUGGESTION_MIN_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub fonts_dir: PathBuf,
    /// Secret mixed into signed download URLs.
    pub signing_secret: String,
    /// Lifetime of the cached client-column catalog.
    pub schema_ttl: Duration,
    pub signed_url_ttl: Duration,
    /// Similarity ratio the populator's fuzzy pass must exceed.
    pub fuzzy_threshold: f64,
    pub json_limit_bytes: usize,
    /// AI suggestions below this confidence are ignored.
    pub suggestion_min_confidence: f64,
    /// Buckets served without a signature.
    pub public_buckets: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<f64>().ok());
        let secs = |name: &str, default: u64| {
            Duration::from_secs(
                lookup(name)
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(default),
            )
        };

        Self {
            host: string("TRUSTDESK_HOST", DEFAULT_HOST),
            port: lookup("TRUSTDESK_PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
            db_path: PathBuf::from(string("TRUSTDESK_DB_PATH", DEFAULT_DB_PATH)),
            storage_dir: PathBuf::from(string("TRUSTDESK_STORAGE_DIR", DEFAULT_STORAGE_DIR)),
            fonts_dir: PathBuf::from(string("TRUSTDESK_FONTS_DIR", DEFAULT_FONTS_DIR)),
            signing_secret: string("TRUSTDESK_SIGNING_SECRET", DEFAULT_SIGNING_SECRET),
            schema_ttl: secs("TRUSTDESK_SCHEMA_TTL_SECS", DEFAULT_SCHEMA_TTL_SECS),
            signed_url_ttl: secs("TRUSTDESK_SIGNED_URL_TTL_SECS", DEFAULT_SIGNED_URL_TTL_SECS),
            fuzzy_threshold: parsed("TRUSTDESK_FUZZY_THRESHOLD")
                .filter(|t| (0.0..=1.0).contains(t))
                .unwrap_or(DEFAULT_FUZZY_THRESHOLD),
            json_limit_bytes: lookup("TRUSTDESK_JSON_LIMIT_MB")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(DEFAULT_JSON_LIMIT_MB)
                * 1024
                * 1024,
            suggestion_min_confidence: parsed("TRUSTDESK_SUGGESTION_MIN_CONFIDENCE")
                .filter(|c| (0.0..=1.0).contains(c))
                .unwrap_or(DEFAULT_SUGGESTION_MIN_CONFIDENCE),
            public_buckets: lookup("TRUSTDESK_PUBLIC_BUCKETS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|b| !b.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn bind_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::default();
        assert_eq!(config.bind_url(), "http://127.0.0.1:8080");
        assert_eq!(config.schema_ttl, Duration::from_secs(300));
        assert_eq!(config.json_limit_bytes, 10 * 1024 * 1024);
        assert_eq!(config.fuzzy_threshold, 0.7);
        assert!(config.public_buckets.is_empty());
    }

    #[test]
    fn variables_override_defaults_and_garbage_is_ignored() {
        let vars = HashMap::from([
            ("TRUSTDESK_PORT", "9000"),
            ("TRUSTDESK_SCHEMA_TTL_SECS", "soon"),
            ("TRUSTDESK_FUZZY_THRESHOLD", "0.85"),
            ("TRUSTDESK_STORAGE_DIR", "  "),
            ("TRUSTDESK_PUBLIC_BUCKETS", "templates, ,assets"),
        ]);
        let config = AppConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.port, 9000);
        assert_eq!(config.schema_ttl, Duration::from_secs(300));
        assert_eq!(config.fuzzy_threshold, 0.85);
        assert_eq!(config.storage_dir, PathBuf::from("./storage"));
        assert_eq!(config.public_buckets, vec!["templates", "assets"]);
    }
}
