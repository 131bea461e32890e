//! Persisted browser session state.
//!
//! The JSON layout matches the common `storage_state` format: a list of
//! cookies plus local storage entries per origin.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Cookie extracted from browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Expiry as seconds since the epoch; negative or absent for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

/// One local storage key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

/// Local storage captured for one origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginStorage {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
}

/// Everything needed to resume an authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub cookies: Vec<BrowserCookie>,
    #[serde(default)]
    pub origins: Vec<OriginStorage>,
}

impl SessionSnapshot {
    /// Load a snapshot from disk, `None` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;

        info!(
            "Saved {} cookies and {} storage origins to {:?}",
            self.cookies.len(),
            self.origins.len(),
            path
        );

        Ok(())
    }

    /// Local storage entries recorded for `origin`.
    pub fn storage_for(&self, origin: &str) -> &[StorageEntry] {
        self.origins
            .iter()
            .find(|o| o.origin.trim_end_matches('/') == origin.trim_end_matches('/'))
            .map(|o| o.local_storage.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("auth_state.json");

        let snapshot = SessionSnapshot {
            cookies: vec![BrowserCookie {
                name: "_session".to_string(),
                value: "abc".to_string(),
                domain: "portal.test".to_string(),
                path: "/".to_string(),
                secure: true,
                http_only: true,
                expires: None,
            }],
            origins: vec![OriginStorage {
                origin: "https://portal.test".to_string(),
                local_storage: vec![StorageEntry {
                    name: "token".to_string(),
                    value: "xyz".to_string(),
                }],
            }],
        };

        snapshot.save(&path).unwrap();
        let loaded = SessionSnapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.storage_for("https://portal.test/").len(), 1);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SessionSnapshot::load(&dir.path().join("nope.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn reads_external_storage_state_layout() {
        let json = r#"{
            "cookies": [{"name": "a", "value": "1", "domain": ".portal.test",
                         "path": "/", "expires": -1, "httpOnly": true,
                         "secure": false, "sameSite": "Lax"}],
            "origins": [{"origin": "https://portal.test",
                         "localStorage": [{"name": "k", "value": "v"}]}]
        }"#;
        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.cookies[0].http_only);
        assert_eq!(snapshot.storage_for("https://portal.test")[0].value, "v");
        assert!(snapshot.storage_for("https://other.test").is_empty());
    }
}
