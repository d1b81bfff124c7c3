//! Persisted URL state.
//!
//! Keeps the last public URL that was pushed to the remote API in a small
//! JSON file (`./config.json` by default):
//!
//! ```json
//! {
//!  "url": "https://abc.ngrok.io"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The persisted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConfig {
    /// Last URL successfully handed to the registrar. Empty before the first
    /// registration.
    #[serde(default)]
    pub url: String,
    /// Fields written by other tools, carried through `save` untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PersistedConfig {
    /// Record holding only the given URL.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Storage for the last registered URL.
pub trait UrlStore {
    /// Read the current record, bootstrapping an empty one if none exists.
    fn load(&self) -> Result<PersistedConfig>;

    /// Overwrite the stored URL, keeping any other fields.
    fn save(&self, url: &str) -> Result<()>;
}

/// [`UrlStore`] backed by a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bootstrap(&self) -> Result<PersistedConfig> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        let default = PersistedConfig::default();
        let mut body = serde_json::to_vec(&default).map_err(|e| Error::json(&self.path, e))?;
        body.push(b'\n');
        std::fs::write(&self.path, body).map_err(|e| Error::io(&self.path, e))?;
        info!(path = %self.path.display(), "Created empty state file");
        Ok(default)
    }
}

impl UrlStore for JsonFileStore {
    fn load(&self) -> Result<PersistedConfig> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return self.bootstrap(),
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        serde_json::from_str(&content).map_err(|e| Error::json(&self.path, e))
    }

    fn save(&self, url: &str) -> Result<()> {
        let mut config = self.load()?;
        url.clone_into(&mut config.url);

        // One-space indent, matching the files produced by earlier releases.
        let mut body = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut body, PrettyFormatter::with_indent(b" "));
        config
            .serialize(&mut ser)
            .map_err(|e| Error::json(&self.path, e))?;

        std::fs::write(&self.path, body).map_err(|e| Error::io(&self.path, e))?;
        debug!(path = %self.path.display(), url = %url, "State file updated");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("config.json"))
    }

    #[test]
    fn load_bootstraps_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let config = store.load().unwrap();
        assert_eq!(config, PersistedConfig::default());
        assert!(config.url.is_empty());

        let on_disk = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(on_disk, "{\"url\":\"\"}\n");
    }

    #[test]
    fn load_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/state/config.json"));

        assert!(store.load().unwrap().url.is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn save_then_load_returns_saved_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save("https://abc.ngrok.io").unwrap();
        let config = store.load().unwrap();
        assert_eq!(config, PersistedConfig::with_url("https://abc.ngrok.io"));
    }

    #[test]
    fn save_writes_single_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save("https://abc.ngrok.io").unwrap();
        let on_disk = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(on_disk, "{\n \"url\": \"https://abc.ngrok.io\"\n}");
    }

    #[test]
    fn save_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"url":"old","owner":"ops"}"#).unwrap();

        store.save("https://new.ngrok.io").unwrap();
        let config = store.load().unwrap();
        assert_eq!(config.url, "https://new.ngrok.io");
        assert_eq!(config.extra.get("owner").unwrap(), "ops");
    }

    #[test]
    fn missing_url_field_defaults_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{}").unwrap();

        assert!(store.load().unwrap().url.is_empty());
    }

    #[test]
    fn malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Json { .. }), "got {err:?}");
    }

    #[test]
    fn save_on_malformed_file_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "not json").unwrap();

        assert!(store.save("https://x.ngrok.io").is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "not json");
    }

    #[test]
    fn unreadable_location_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let store = JsonFileStore::new(dir.path());

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "got {err:?}");
    }
}
