//! Configuration manager for hireboard.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PORT: u16 = 8888;
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Public URL of current instance.
    pub url: String,
    /// Listening port.
    pub port: u16,
    #[serde(skip_deserializing)]
    pub version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    /// When missing, data only lives in memory.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to JsonWebToken configuration.
    #[serde(skip_serializing)]
    pub token: Token,
    /// Related to uploaded assets.
    #[serde(skip_serializing)]
    pub storage: Storage,
    /// Business rules that can be tuned per instance.
    pub policy: Policy,
    /// Related to logged-out tokens.
    #[serde(skip_serializing)]
    pub revocation: Revocation,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").to_owned(),
            url: format!("http://localhost:{DEFAULT_PORT}"),
            port: DEFAULT_PORT,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            argon2: None,
            token: Token::default(),
            storage: Storage::default(),
            policy: Policy::default(),
            revocation: Revocation::default(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Json Web Token configuration.
///
/// Either `secret` (HS256) or the PEM pair (ES384) must be set.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub secret: Option<String>,
    pub public_key_pem: Option<String>,
    pub private_key_pem: Option<String>,
    /// Update token audience.
    /// Default is the instance name.
    pub audience: Option<String>,
    /// Lifetime of an issued token.
    pub ttl_days: i64,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            secret: None,
            public_key_pem: None,
            private_key_pem: None,
            audience: None,
            ttl_days: 7,
        }
    }
}

/// Uploaded assets configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Directory where assets are written.
    pub directory: PathBuf,
    /// Base URL assets are served from.
    /// Default is `{url}/uploads/`.
    pub public_url: Option<String>,
    /// Maximum decoded size of one asset, in bytes.
    pub max_size: usize,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("uploads"),
            public_url: None,
            max_size: 10 * 1024 * 1024,
        }
    }
}

/// Which portfolio fields are mandatory on creation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioPolicy {
    /// Skills, description and file are all required.
    #[default]
    All,
    /// At least one of them is required.
    Any,
}

/// Tunable business rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub portfolio: PortfolioPolicy,
    /// Reject applications outside `[submission_start, submission_end]`.
    pub enforce_submission_window: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            portfolio: PortfolioPolicy::All,
            enforce_submission_window: true,
        }
    }
}

/// Revocation ledger configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Revocation {
    /// Interval between two prunings of expired entries.
    pub prune_interval_secs: u64,
}

impl Default for Revocation {
    fn default() -> Self {
        Self {
            prune_interval_secs: 60 * 60,
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Base URL of uploaded assets, always ending with `/`.
    pub fn public_storage_url(&self) -> Result<Url, url::ParseError> {
        let raw = match &self.storage.public_url {
            Some(url) => Self::normalize_url(url)?,
            None => format!("{}/uploads/", self.url.trim_end_matches('/')),
        };

        if raw.ends_with('/') {
            Url::parse(&raw)
        } else {
            Url::parse(&format!("{raw}/"))
        }
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config = match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        config.version = VERSION.to_owned();
        config.apply_env();
        config.url = Self::normalize_url(&config.url)?;

        Ok(Arc::new(config))
    }

    fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.token.secret = Some(secret);
        }

        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
name: board
url: jobs.example.com
policy:
  portfolio: any
"#;
        let config: Configuration = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.name, "board");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.token.ttl_days, 7);
        assert_eq!(config.policy.portfolio, PortfolioPolicy::Any);
        assert!(config.policy.enforce_submission_window);
        assert!(config.postgres.is_none());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            Configuration::normalize_url("jobs.example.com").unwrap(),
            "https://jobs.example.com/"
        );
        assert_eq!(
            Configuration::normalize_url("http://localhost:8888").unwrap(),
            "http://localhost:8888/"
        );
    }

    #[test]
    fn test_public_storage_url() {
        let config = Configuration {
            url: "http://localhost:8888/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.public_storage_url().unwrap().as_str(),
            "http://localhost:8888/uploads/"
        );

        let config = Configuration {
            storage: Storage {
                public_url: Some("cdn.example.com/assets".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            config.public_storage_url().unwrap().as_str(),
            "https://cdn.example.com/assets/"
        );
    }
}
