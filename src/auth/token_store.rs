use serde::{Deserialize, Serialize, Serializer, Deserializer};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use secrecy::{SecretString, ExposeSecret};

/// Serialize SecretString for storage
fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

/// Deserialize SecretString from storage
fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

/// Saved OAuth credential for one API provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredential {
    /// Provider key (e.g., "DigikeyApi")
    pub provider: String,
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub access_token: SecretString,
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub refresh_token: SecretString,
    pub date_created_utc: DateTime<Utc>,
    pub date_expires_utc: DateTime<Utc>,
}

impl OAuthCredential {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.date_expires_utc
    }
}

/// Credential storage - persists to a JSON file, mirrored in memory
#[derive(Debug, Clone)]
pub struct TokenStore {
    file_path: PathBuf,
    credentials: Arc<RwLock<HashMap<String, OAuthCredential>>>,
}

impl TokenStore {
    /// Loads existing credentials from file if it exists
    pub fn new(file_path: PathBuf) -> Result<Self> {
        let credentials = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .context("Failed to read token file")?;
            serde_json::from_str(&content)
                .context("Failed to parse token file")?
        } else {
            HashMap::new()
        };

        Ok(Self {
            file_path,
            credentials: Arc::new(RwLock::new(credentials)),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.file_path
    }

    pub fn save(&self, credential: OAuthCredential) -> Result<()> {
        {
            let mut credentials = self.credentials.write()
                .map_err(|_| anyhow!("Token store lock poisoned"))?;
            credentials.insert(credential.provider.clone(), credential);
        }

        self.persist()
    }

    pub fn get(&self, provider: &str) -> Option<OAuthCredential> {
        let credentials = self.credentials.read().ok()?;
        credentials.get(provider).cloned()
    }

    pub fn remove(&self, provider: &str) -> Result<()> {
        let removed = {
            let mut credentials = self.credentials.write()
                .map_err(|_| anyhow!("Token store lock poisoned"))?;
            credentials.remove(provider).is_some()
        };

        if removed {
            self.persist()?;
        }

        Ok(())
    }

    pub fn list_providers(&self) -> Vec<String> {
        match self.credentials.read() {
            Ok(credentials) => credentials.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn persist(&self) -> Result<()> {
        let json = {
            let credentials = self.credentials.read()
                .map_err(|_| anyhow!("Token store lock poisoned"))?;
            serde_json::to_string_pretty(&*credentials)
                .context("Failed to serialize credentials")?
        };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create token directory")?;
        }

        fs::write(&self.file_path, json)
            .context("Failed to write token file")?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.file_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.file_path, perms)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn credential(provider: &str, expires_in: chrono::Duration) -> OAuthCredential {
        OAuthCredential {
            provider: provider.to_string(),
            access_token: SecretString::new("access-123".to_string()),
            refresh_token: SecretString::new("refresh-456".to_string()),
            date_created_utc: Utc::now(),
            date_expires_utc: Utc::now() + expires_in,
        }
    }

    #[test]
    fn test_save_get_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = TokenStore::new(temp_dir.path().join("tokens.json")).unwrap();

        store.save(credential("DigikeyApi", chrono::Duration::hours(1))).unwrap();

        let retrieved = store.get("DigikeyApi").unwrap();
        assert_eq!(retrieved.access_token.expose_secret(), "access-123");
        assert_eq!(retrieved.refresh_token.expose_secret(), "refresh-456");
        assert_eq!(store.list_providers(), vec!["DigikeyApi".to_string()]);

        store.remove("DigikeyApi").unwrap();
        assert!(store.get("DigikeyApi").is_none());
    }

    #[test]
    fn test_credentials_survive_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tokens.json");

        {
            let store = TokenStore::new(path.clone()).unwrap();
            store.save(credential("DigikeyApi", chrono::Duration::minutes(30))).unwrap();
        }

        let reopened = TokenStore::new(path.clone()).unwrap();
        let loaded = reopened.get("DigikeyApi").unwrap();
        assert_eq!(loaded.access_token.expose_secret(), "access-123");
        assert!(!loaded.is_expired());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_expiration() {
        assert!(credential("a", chrono::Duration::hours(-1)).is_expired());
        assert!(!credential("a", chrono::Duration::hours(1)).is_expired());
    }
}
