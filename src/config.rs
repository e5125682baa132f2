use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use log::{info, warn};

use crate::error::ConfigError;
use crate::tokens::AuthConfig;

const DEV_ACCESS_SECRET: &str = "chart-studio-dev-access-secret";
const DEV_REFRESH_SECRET: &str = "chart-studio-dev-refresh-secret";

/// Runtime configuration for the server and the seed tool
///
/// Every value comes from an environment variable with a default, so a bare
/// `studio` invocation works for local development.
#[derive(Clone, Debug)]
pub struct Config {
    /// Port the HTTP server binds to (`STUDIO_PORT`)
    pub port: u16,

    /// Root of the JSON user database and chart documents (`STUDIO_DATA_DIR`)
    pub data_dir: PathBuf,

    /// Where uploaded CSV files are staged while a chart is built (`STUDIO_UPLOAD_DIR`)
    pub upload_dir: PathBuf,

    /// Number of charts returned by the community feed (`STUDIO_FEED_SIZE`)
    pub feed_size: usize,

    /// Largest accepted request body in bytes (`STUDIO_MAX_UPLOAD_BYTES`)
    pub max_upload_bytes: usize,

    /// Origin allowed to make credentialed requests (`STUDIO_CORS_ORIGIN`)
    pub cors_origin: String,

    /// Mark auth cookies `Secure` (`STUDIO_SECURE_COOKIES`)
    pub secure_cookies: bool,

    /// Token secrets and lifetimes
    pub auth: AuthConfig,
}

impl Config {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary key lookup
    ///
    /// # Arguments
    /// * `lookup` - Returns the raw value for a key, or `None` when unset
    ///
    /// # Errors
    /// * `ConfigError::Invalid` when a value is present but does not parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth = AuthConfig {
            access_secret: secret(&lookup, "ACCESS_TOKEN_SECRET", DEV_ACCESS_SECRET),
            refresh_secret: secret(&lookup, "REFRESH_TOKEN_SECRET", DEV_REFRESH_SECRET),
            access_ttl_secs: try_load(&lookup, "ACCESS_TOKEN_TTL_SECS", "86400")?,
            refresh_ttl_secs: try_load(&lookup, "REFRESH_TOKEN_TTL_SECS", "864000")?,
        };

        Ok(Self {
            port: try_load(&lookup, "STUDIO_PORT", "5000")?,
            data_dir: try_load(&lookup, "STUDIO_DATA_DIR", "database")?,
            upload_dir: try_load(&lookup, "STUDIO_UPLOAD_DIR", "public/temp")?,
            feed_size: try_load(&lookup, "STUDIO_FEED_SIZE", "12")?,
            max_upload_bytes: try_load(&lookup, "STUDIO_MAX_UPLOAD_BYTES", "10485760")?,
            cors_origin: try_load(&lookup, "STUDIO_CORS_ORIGIN", "http://localhost:5173")?,
            secure_cookies: try_load(&lookup, "STUDIO_SECURE_COOKIES", "false")?,
            auth,
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn secret<F>(lookup: &F, key: &'static str, fallback: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|s| s.trim().to_string()) {
        Some(value) if !value.is_empty() => value,
        _ => {
            warn!("{key} not set, falling back to the development secret");
            fallback.to_string()
        }
    }
}
