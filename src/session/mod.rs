//! File-backed session store
//!
//! A session is a namespace over a small fixed set of artifact roles. Nothing
//! is cached in memory: every call resolves `<data_dir>/<session_id><suffix>`
//! afresh, so independent requests see each other's writes through the file
//! system only.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DatalabError, Result};

/// Artifact roles a session may own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    Raw,
    Cleaned,
    Model,
    History,
}

impl ArtifactRole {
    pub const ALL: [ArtifactRole; 4] = [
        ArtifactRole::Raw,
        ArtifactRole::Cleaned,
        ArtifactRole::Model,
        ArtifactRole::History,
    ];

    /// File name suffix appended to the session id
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactRole::Raw => "_raw.csv",
            ArtifactRole::Cleaned => "_cleaned.csv",
            ArtifactRole::Model => "_model.bin",
            ArtifactRole::History => "_history.json",
        }
    }

    /// Client-facing message used when this artifact is a missing prerequisite
    pub fn missing_message(self) -> &'static str {
        match self {
            ArtifactRole::Raw => "Session not found",
            ArtifactRole::Cleaned => {
                "Cleaned data used for comparison not found. Please impute first."
            }
            ArtifactRole::Model => "No trained model for this session. Please train first.",
            ArtifactRole::History => "No training history for this session",
        }
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactRole::Raw => "raw",
            ArtifactRole::Cleaned => "cleaned",
            ArtifactRole::Model => "model",
            ArtifactRole::History => "history",
        };
        f.write_str(name)
    }
}

/// Opaque session identifier (canonical hyphenated UUID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a client-supplied id. Anything that is not a UUID is treated as an
    /// unknown session so it never reaches the file system.
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw)
            .map(|uuid| Self(uuid.hyphenated().to_string()))
            .map_err(|_| DatalabError::NotFound(ArtifactRole::Raw.missing_message().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps session ids to artifact files under a single working directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Open (and create if needed) the working directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a new session id. No file is written until the first artifact.
    pub fn create_session(&self) -> SessionId {
        SessionId::generate()
    }

    /// File name of an artifact, relative to the working directory
    pub fn file_name(&self, id: &SessionId, role: ArtifactRole) -> String {
        format!("{}{}", id, role.suffix())
    }

    fn path_for(&self, id: &SessionId, role: ArtifactRole) -> PathBuf {
        self.root.join(self.file_name(id, role))
    }

    /// Path of an artifact if it exists
    pub fn artifact_path(&self, id: &SessionId, role: ArtifactRole) -> Option<PathBuf> {
        let path = self.path_for(id, role);
        path.is_file().then_some(path)
    }

    pub fn exists(&self, id: &SessionId, role: ArtifactRole) -> bool {
        self.artifact_path(id, role).is_some()
    }

    /// Replace an artifact. The bytes land in a sibling temp file first and are
    /// renamed into place, so readers never see a partial write. Concurrent
    /// writers to the same role resolve last-write-wins.
    pub fn write_artifact(&self, id: &SessionId, role: ArtifactRole, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.path_for(id, role);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", self.file_name(id, role), Uuid::new_v4().simple()));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(session_id = %id, role = %role, bytes = bytes.len(), "Artifact written");
        Ok(target)
    }

    /// Replace several artifacts as one unit. If any write fails, the roles
    /// already replaced are put back to their previous content (or removed if
    /// they did not exist) before the error is returned.
    pub fn write_artifacts(&self, id: &SessionId, writes: &[(ArtifactRole, &[u8])]) -> Result<()> {
        let mut committed: Vec<(ArtifactRole, Option<Vec<u8>>)> = Vec::with_capacity(writes.len());

        for &(role, bytes) in writes {
            let previous = self.read_optional(id, role)?;
            if let Err(e) = self.write_artifact(id, role, bytes) {
                for (done, previous) in committed.into_iter().rev() {
                    let restored = match previous {
                        Some(old) => self.write_artifact(id, done, &old).map(|_| ()),
                        None => self.remove_artifact(id, done),
                    };
                    if let Err(restore_err) = restored {
                        warn!(session_id = %id, role = %done, error = %restore_err, "Failed to roll back artifact");
                    }
                }
                return Err(e);
            }
            committed.push((role, previous));
        }
        Ok(())
    }

    /// Delete an artifact; absent artifacts are not an error
    pub fn remove_artifact(&self, id: &SessionId, role: ArtifactRole) -> Result<()> {
        match fs::remove_file(self.path_for(id, role)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read an artifact, `NotFound` if it does not exist
    pub fn read_artifact(&self, id: &SessionId, role: ArtifactRole) -> Result<Vec<u8>> {
        let path = self
            .artifact_path(id, role)
            .ok_or_else(|| DatalabError::NotFound(role.missing_message().to_string()))?;
        Ok(fs::read(path)?)
    }

    /// Like `read_artifact` but absent artifacts yield `None`
    pub fn read_optional(&self, id: &SessionId, role: ArtifactRole) -> Result<Option<Vec<u8>>> {
        match self.artifact_path(id, role) {
            Some(path) => Ok(Some(fs::read(path)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store();
        let id = store.create_session();
        assert!(!store.exists(&id, ArtifactRole::Raw));

        store.write_artifact(&id, ArtifactRole::Raw, b"a,b\n1,2\n").unwrap();
        assert!(store.exists(&id, ArtifactRole::Raw));
        assert_eq!(store.read_artifact(&id, ArtifactRole::Raw).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_file_layout_uses_suffixes() {
        let (dir, store) = store();
        let id = store.create_session();
        for role in ArtifactRole::ALL {
            store.write_artifact(&id, role, b"x").unwrap();
            let expected = dir.path().join(format!("{}{}", id, role.suffix()));
            assert!(expected.is_file(), "missing {}", expected.display());
        }
        // no temp files left behind
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_overwrite_is_last_write_wins() {
        let (_dir, store) = store();
        let id = store.create_session();
        store.write_artifact(&id, ArtifactRole::Cleaned, b"first").unwrap();
        store.write_artifact(&id, ArtifactRole::Cleaned, b"second").unwrap();
        assert_eq!(store.read_artifact(&id, ArtifactRole::Cleaned).unwrap(), b"second");
    }

    #[test]
    fn test_write_artifacts_rolls_back_on_failure() {
        let (dir, store) = store();
        let id = store.create_session();
        // a directory in the history slot makes the final rename fail
        let blocker = dir.path().join(store.file_name(&id, ArtifactRole::History));
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        let err = store.write_artifacts(
            &id,
            &[(ArtifactRole::Model, &b"new model"[..]), (ArtifactRole::History, &b"[]"[..])],
        );
        assert!(err.is_err());
        assert!(!store.exists(&id, ArtifactRole::Model));

        store.write_artifact(&id, ArtifactRole::Model, b"old model").unwrap();
        let err = store.write_artifacts(
            &id,
            &[(ArtifactRole::Model, &b"new model"[..]), (ArtifactRole::History, &b"[]"[..])],
        );
        assert!(err.is_err());
        assert_eq!(store.read_artifact(&id, ArtifactRole::Model).unwrap(), b"old model");
    }

    #[test]
    fn test_write_artifacts_writes_all() {
        let (_dir, store) = store();
        let id = store.create_session();
        store
            .write_artifacts(&id, &[(ArtifactRole::Model, &b"m"[..]), (ArtifactRole::History, &b"[]"[..])])
            .unwrap();
        assert_eq!(store.read_artifact(&id, ArtifactRole::Model).unwrap(), b"m");
        assert_eq!(store.read_artifact(&id, ArtifactRole::History).unwrap(), b"[]");

        store.remove_artifact(&id, ArtifactRole::Model).unwrap();
        store.remove_artifact(&id, ArtifactRole::Model).unwrap();
        assert!(!store.exists(&id, ArtifactRole::Model));
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let (_dir, store) = store();
        let id = store.create_session();
        let err = store.read_artifact(&id, ArtifactRole::Model).unwrap_err();
        assert!(matches!(err, DatalabError::NotFound(_)));
        assert!(store.read_optional(&id, ArtifactRole::History).unwrap().is_none());
    }

    #[test]
    fn test_session_id_rejects_paths() {
        assert!(SessionId::parse("../../etc/passwd").is_err());
        assert!(SessionId::parse("").is_err());
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(id.as_str()).unwrap(), id);
        // uppercase input canonicalises to the same id
        assert_eq!(SessionId::parse(&id.as_str().to_uppercase()).unwrap(), id);
    }
}
