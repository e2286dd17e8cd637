use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{load_token_file, AuthGate, TokenError};

const TOKEN_ENV: &str = "PETSTORE_TOKEN";

#[derive(Debug, Default, Parser)]
#[command(
    name = "petstore-rs",
    version,
    about = "In-memory pet store HTTP service"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, value_name = "SECRET")]
    pub token: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub token_file: Option<PathBuf>,

    #[arg(long, value_name = "DURATION")]
    pub session_ttl: Option<String>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub token: TokenSource,
    pub session_ttl: Duration,
}

/// Where the shared secret was configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Inline(String),
    File(PathBuf),
}

impl TokenSource {
    pub fn describe(&self) -> String {
        match self {
            TokenSource::Inline(_) => String::from("inline"),
            TokenSource::File(path) => path.display().to_string(),
        }
    }

    pub fn into_gate(self) -> Result<AuthGate, TokenError> {
        match self {
            TokenSource::Inline(token) => AuthGate::new(&token),
            TokenSource::File(path) => load_token_file(&path),
        }
    }
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
    #[error("invalid session ttl {value:?}: {source}")]
    InvalidTtl {
        value: String,
        source: humantime::DurationError,
    },
    #[error("no auth token configured; pass --token, --token-file, or set PETSTORE_TOKEN")]
    MissingToken,
    #[error("{origin} sets both an inline token and a token file; keep one")]
    ConflictingToken { origin: &'static str },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    token: Option<String>,
    token_file: Option<PathBuf>,
    session_ttl: Option<String>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let env_token = std::env::var(TOKEN_ENV).ok();
        Self::resolve(cli, env_token)
    }

    fn resolve(cli: Cli, env_token: Option<String>) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;

        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let from_cli = single_token(cli.token, cli.token_file, "command line")?;
        let in_file = single_token(from_file.token, from_file.token_file, "config file")?;
        let token = from_cli
            .or_else(|| non_blank(env_token).map(TokenSource::Inline))
            .or(in_file)
            .ok_or(ConfigError::MissingToken)?;

        let raw_ttl = cli
            .session_ttl
            .or(from_file.session_ttl)
            .unwrap_or_else(|| String::from("24h"));
        let session_ttl = parse_ttl(&raw_ttl)?;

        Ok(Self {
            bind,
            token,
            session_ttl,
        })
    }
}

/// At most one token setting per layer; naming both is a configuration error.
fn single_token(
    inline: Option<String>,
    file: Option<PathBuf>,
    origin: &'static str,
) -> Result<Option<TokenSource>, ConfigError> {
    match (inline, file) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingToken { origin }),
        (Some(token), None) => Ok(Some(TokenSource::Inline(token))),
        (None, Some(path)) => Ok(Some(TokenSource::File(path))),
        (None, None) => Ok(None),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_ttl(raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|source| ConfigError::InvalidTtl {
        value: String::from(raw),
        source,
    })
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
