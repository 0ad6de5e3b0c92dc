use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use thiserror::Error;

use crate::constants::{OBSCENITY_THRESHOLD, PAGE_SIZE};

const DEFAULT_SECRET_KEY: &str = "insecure-development-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub secret_key: String,
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub media_root: PathBuf,
    pub media_url: String,
    pub token_lifetime_hours: i64,
    pub page_size: i64,
    pub obscenity_threshold: usize,
    pub csv_folder: PathBuf,
    pub max_body_size: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, `load` reads the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let secret_key = lookup("SECRET_KEY").unwrap_or_else(|| {
            log::warn!("SECRET_KEY not set, using an insecure development key");
            DEFAULT_SECRET_KEY.to_string()
        });

        let port: u16 = try_load(&lookup, "PORT", "8000")?;
        let host = lookup("HOST").unwrap_or_else(|| String::from("0.0.0.0"));
        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let mut media_url = lookup("MEDIA_URL").unwrap_or_else(|| String::from("/media/"));
        if !media_url.ends_with('/') {
            media_url.push('/');
        }

        let token_lifetime_hours: i64 = try_load(&lookup, "TOKEN_LIFETIME_HOURS", "24")?;
        if token_lifetime_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_LIFETIME_HOURS",
                info: String::from("must be positive"),
            });
        }

        let page_size: i64 = try_load(&lookup, "PAGE_SIZE", &PAGE_SIZE.to_string())?;
        if page_size <= 0 {
            return Err(ConfigError::Invalid {
                key: "PAGE_SIZE",
                info: String::from("must be positive"),
            });
        }

        Ok(Self {
            database_url,
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            secret_key,
            host,
            port,
            public_url,
            media_root: PathBuf::from(lookup("MEDIA_ROOT").unwrap_or_else(|| String::from("media"))),
            media_url,
            token_lifetime_hours,
            page_size,
            obscenity_threshold: try_load(
                &lookup,
                "OBSCENITY_THRESHOLD",
                &OBSCENITY_THRESHOLD.to_string(),
            )?,
            csv_folder: PathBuf::from(
                lookup("CSV_FOLDER").unwrap_or_else(|| String::from("static/data")),
            ),
            max_body_size: try_load(&lookup, "MAX_BODY_SIZE", "10485760")?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
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
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            info: e.to_string(),
        })
}
