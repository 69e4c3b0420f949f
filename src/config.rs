use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(
    name = "tienda-rs",
    version,
    about = "Minimal e-commerce backend for users, products and deliveries"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, value_name = "URI")]
    pub mongo_uri: Option<String>,

    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub mongo_uri: String,
    pub database: String,
    /// HMAC secret for session tokens. Required; never defaulted.
    pub token_secret: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("environment variable {key} is not valid unicode")]
    InvalidEnv { key: String },
    #[error("no token secret configured; set JWT_SECRET or token_secret in the config file")]
    MissingSecret,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    mongo_uri: Option<String>,
    database: Option<String>,
    token_secret: Option<String>,
}

#[derive(Debug, Default)]
struct EnvOverrides {
    mongo_uri: Option<String>,
    token_secret: Option<String>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;
        let from_env = read_env_overrides()?;
        Self::resolve(cli, from_file, from_env)
    }

    fn resolve(cli: Cli, file: FileConfig, env: EnvOverrides) -> Result<Self, ConfigError> {
        let bind = cli
            .bind
            .or(file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));
        let mongo_uri = cli
            .mongo_uri
            .or(env.mongo_uri)
            .or(file.mongo_uri)
            .unwrap_or_else(|| String::from("mongodb://127.0.0.1:27017"));
        let database = cli
            .database
            .or(file.database)
            .unwrap_or_else(|| String::from("tienda"));
        let token_secret = env
            .token_secret
            .or(file.token_secret)
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        Ok(Self {
            bind,
            mongo_uri,
            database,
            token_secret,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env_overrides() -> Result<EnvOverrides, ConfigError> {
    Ok(EnvOverrides {
        mongo_uri: read_env("MONGODB_URI")?,
        token_secret: read_env("JWT_SECRET")?,
    })
}

fn read_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnv {
            key: String::from(key),
        }),
    }
}
