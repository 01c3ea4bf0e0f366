use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding config, database, token file and PID file (~/.binner)
pub fn data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".binner"))
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub digikey: DigikeyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; defaults to ~/.binner/binner.db
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: None,
            pool_size: default_pool_size(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("binner.db")),
        }
    }
}

/// DigiKey API and OAuth settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigikeyConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Must match the redirect URL registered with the DigiKey app
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    #[serde(default = "default_locale_site")]
    pub locale_site: String,
    #[serde(default = "default_locale_language")]
    pub locale_language: String,
    #[serde(default = "default_locale_currency")]
    pub locale_currency: String,
    /// How long to wait for the OAuth redirect before giving up
    #[serde(default = "default_authorization_timeout_secs")]
    pub authorization_timeout_secs: u64,
    /// Credential file; defaults to ~/.binner/oauth_tokens.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for DigikeyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            api_url: default_api_url(),
            redirect_url: default_redirect_url(),
            locale_site: default_locale_site(),
            locale_language: default_locale_language(),
            locale_currency: default_locale_currency(),
            authorization_timeout_secs: default_authorization_timeout_secs(),
            token_file: None,
        }
    }
}

impl DigikeyConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    pub fn authorization_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.authorization_timeout_secs.max(1))
    }

    pub fn token_file_path(&self) -> Result<PathBuf> {
        match &self.token_file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("oauth_tokens.json")),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_pool_size() -> u32 {
    4
}

fn default_auth_url() -> String {
    "https://sandbox-api.digikey.com/v1/oauth2/authorize".to_string()
}

fn default_token_url() -> String {
    "https://sandbox-api.digikey.com/v1/oauth2/token".to_string()
}

fn default_api_url() -> String {
    "https://sandbox-api.digikey.com".to_string()
}

fn default_redirect_url() -> String {
    "http://127.0.0.1:8090/Authorization/Authorize".to_string()
}

fn default_locale_site() -> String {
    "CA".to_string()
}

fn default_locale_language() -> String {
    "en".to_string()
}

fn default_locale_currency() -> String {
    "CAD".to_string()
}

fn default_authorization_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            digikey: DigikeyConfig::default(),
        }
    }
}

impl AppConfig {
    /// ~/.binner/config.toml
    pub fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load config from a TOML file, then apply `BINNER__SECTION__KEY` overrides.
    /// A missing file is not an error; defaults apply.
    pub fn from_file(path: &Path) -> Result<Self> {
        let path_str = path.to_string_lossy();
        let settings = Config::builder()
            .add_source(File::new(&path_str, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("BINNER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Serialize to TOML (used by `binner init`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
