use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// File-backed key/value store for the session credential.
///
/// Only stores what the sync layer needs: the bearer token and, when the
/// backend reports one, its expiry. Acquiring the token happens elsewhere.
pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    pub fn get_access_token(&self) -> Option<&String> {
        self.get("access_token")
    }

    pub fn set_access_token(&mut self, token: String) {
        self.set("access_token".to_string(), token);
    }

    pub fn get_token_expires(&self) -> Option<DateTime<Utc>> {
        self.get("token_expires")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_token_expires(&mut self, expires: DateTime<Utc>) {
        self.set("token_expires".to_string(), expires.to_rfc3339());
    }

    /// Token that is present and not past its recorded expiry
    pub fn valid_access_token(&self) -> Option<&String> {
        let token = self.get_access_token()?;
        match self.get_token_expires() {
            Some(expires_at) if expires_at <= Utc::now() => None,
            _ => Some(token),
        }
    }

    /// Drop the token and its expiry (logout or a 401 from the backend)
    pub fn clear_session(&mut self) {
        self.remove("access_token");
        self.remove("token_expires");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_credential_store_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut store = CredentialStore::new(path.clone());
        store.set_access_token("test_token".to_string());
        store.save().unwrap();

        let mut loaded_store = CredentialStore::new(path);
        loaded_store.load().unwrap();
        assert_eq!(loaded_store.get_access_token(), Some(&"test_token".to_string()));
    }

    #[test]
    fn test_expired_token_is_not_valid() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set_access_token("old".to_string());
        store.set_token_expires(Utc::now() - chrono::Duration::minutes(1));
        assert_eq!(store.valid_access_token(), None);

        store.set_token_expires(Utc::now() + chrono::Duration::hours(1));
        assert_eq!(store.valid_access_token(), Some(&"old".to_string()));
    }

    #[test]
    fn test_clear_session() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set_access_token("token".to_string());
        store.set_token_expires(Utc::now());
        store.set("other".to_string(), "kept".to_string());

        store.clear_session();
        assert_eq!(store.get_access_token(), None);
        assert_eq!(store.get_token_expires(), None);
        assert_eq!(store.get("other"), Some(&"kept".to_string()));
    }
}
