//! Key-value persistence for the session and the PKCE verifier.

use super::error::GoTrueError;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use url::Url;

pub trait SessionStorage: Send + Sync {
    /// # Errors
    /// [`GoTrueError::Storage`] if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, GoTrueError>;

    /// # Errors
    /// [`GoTrueError::Storage`] if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), GoTrueError>;

    /// # Errors
    /// [`GoTrueError::Storage`] if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), GoTrueError>;
}

/// Storage keys for one auth project, derived from its host
/// (`sb-<project>-auth-token`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    pub session: String,
    pub code_verifier: String,
}

impl StorageKeys {
    #[must_use]
    pub fn for_project(auth_url: &Url) -> Self {
        let project = auth_url
            .host_str()
            .and_then(|host| host.split('.').next())
            .filter(|label| !label.is_empty())
            .unwrap_or("local");
        let session = format!("sb-{project}-auth-token");
        Self {
            code_verifier: format!("{session}-code-verifier"),
            session,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, GoTrueError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GoTrueError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GoTrueError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// JSON object on disk, one string value per key. Writes go to a sibling
/// temp file that is then renamed over the original; on unix the file is
/// readable by the owner only.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, GoTrueError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(GoTrueError::Storage(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let json: Value = serde_json::from_str(&raw).map_err(|err| {
            GoTrueError::Storage(format!("corrupt session file {}: {err}", self.path.display()))
        })?;
        Ok(json
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), GoTrueError> {
        let storage_err = |err: std::io::Error| {
            GoTrueError::Storage(format!("failed to write {}: {err}", self.path.display()))
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(storage_err)?;
        }

        let body = serde_json::to_string_pretty(entries)
            .map_err(|err| GoTrueError::Serialization(err.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(storage_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).map_err(storage_err)?;
        }

        fs::rename(&tmp, &self.path).map_err(storage_err)
    }

    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), GoTrueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        change(&mut entries);
        self.save(&entries)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, GoTrueError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GoTrueError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), GoTrueError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir()
            .join(format!("meiportal-{name}-{}-{nanos}", std::process::id()))
            .join("session.json")
    }

    #[test]
    fn keys_follow_project_ref() {
        let keys = StorageKeys::for_project(&Url::parse("https://abcd1234.supabase.co").unwrap());
        assert_eq!(keys.session, "sb-abcd1234-auth-token");
        assert_eq!(keys.code_verifier, "sb-abcd1234-auth-token-code-verifier");
    }

    #[test]
    fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
        storage.remove("k").unwrap();
        assert!(storage.get("k").unwrap().is_none());
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let path = scratch_path("persist");
        FileStorage::new(&path).set("token", "{\"a\":1}").unwrap();
        FileStorage::new(&path).set("other", "x").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("{\"a\":1}"));
        reopened.remove("token").unwrap();
        assert!(reopened.get("token").unwrap().is_none());
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("x"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let storage = FileStorage::new(scratch_path("missing"));
        assert!(storage.get("anything").unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = scratch_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let err = FileStorage::new(&path).get("k").unwrap_err();
        assert!(matches!(err, GoTrueError::Storage(_)));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
