//! File-backed saved-state store.
//!
//! Layout inside the store directory:
//! ```text
//! state.meta.json        - metadata and schema version
//! camera/
//!   <key>.cbor           - CBOR camera snapshots, one per key
//! integrity/
//!   manifest.json        - sha256 of every stored file
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use vectormap_camera::CameraSnapshot;

use crate::codec::{from_cbor, to_cbor};

/// Current schema version of the store layout.
const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("{0} is not in the integrity manifest")]
    Untracked(String),
    #[error("invalid key {0:?}: use ASCII letters, digits, '-', '_' or '.'")]
    InvalidKey(String),
}

/// Metadata stored in state.meta.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_version: u32,
    pub camera_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IntegrityManifest {
    entries: Vec<ManifestEntry>,
}

impl IntegrityManifest {
    fn get(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    fn upsert(&mut self, filename: String, sha256: String) {
        match self.entries.iter_mut().find(|e| e.filename == filename) {
            Some(entry) => entry.sha256 = sha256,
            None => self.entries.push(ManifestEntry { filename, sha256 }),
        }
    }

    fn remove(&mut self, filename: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.filename != filename);
        self.entries.len() != before
    }
}

/// Keyed camera snapshots saved across process restarts.
pub struct SavedStateStore {
    root: PathBuf,
    meta: StoreMeta,
    manifest: IntegrityManifest,
}

impl SavedStateStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("camera"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join("state.meta.json");
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.schema_version != STATE_SCHEMA_VERSION {
                return Err(PersistError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: STATE_SCHEMA_VERSION,
                });
            }
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = StoreMeta {
                schema_version: STATE_SCHEMA_VERSION,
                camera_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };
        tracing::debug!(root = %root.display(), cameras = meta.camera_count, "saved-state store opened");

        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest.entries
    }

    /// Saved camera keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .manifest
            .entries
            .iter()
            .filter_map(|e| e.filename.strip_suffix(".cbor"))
            .map(str::to_owned)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Write (or overwrite) the snapshot saved under `key`.
    pub fn save_camera(&mut self, key: &str, snapshot: &CameraSnapshot) -> Result<(), PersistError> {
        let filename = camera_file(key)?;
        let bytes = to_cbor(snapshot)?;
        let hash = sha256_hex(&bytes);
        std::fs::write(self.root.join("camera").join(&filename), &bytes)?;

        if self.manifest.get(&filename).is_none() {
            self.meta.camera_count += 1;
        }
        self.manifest.upsert(filename, hash);
        self.save_meta()?;
        self.save_manifest()?;
        tracing::debug!(key, "camera snapshot saved");
        Ok(())
    }

    /// Load the snapshot saved under `key`, or `None` if nothing was saved.
    pub fn load_camera(&self, key: &str) -> Result<Option<CameraSnapshot>, PersistError> {
        let filename = camera_file(key)?;
        let Some(entry) = self.manifest.get(&filename) else {
            return Ok(None);
        };
        let data = std::fs::read(self.root.join("camera").join(&filename))?;
        verify(entry, &data)?;
        from_cbor(&data).map(Some)
    }

    /// Returns whether anything was saved under `key`.
    pub fn remove_camera(&mut self, key: &str) -> Result<bool, PersistError> {
        let filename = camera_file(key)?;
        if !self.manifest.remove(&filename) {
            return Ok(false);
        }
        let path = self.root.join("camera").join(&filename);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        self.meta.camera_count = self.meta.camera_count.saturating_sub(1);
        self.save_meta()?;
        self.save_manifest()?;
        Ok(true)
    }

    /// Verify every file listed in the manifest, and that no stray snapshot
    /// files exist beside them.
    pub fn verify_integrity(&self) -> Result<(), PersistError> {
        for entry in &self.manifest.entries {
            let data = std::fs::read(self.root.join("camera").join(&entry.filename))?;
            verify(entry, &data)?;
        }
        for file in std::fs::read_dir(self.root.join("camera"))? {
            let name = file?.file_name().to_string_lossy().into_owned();
            if self.manifest.get(&name).is_none() {
                return Err(PersistError::Untracked(name));
            }
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<(), PersistError> {
        let path = self.root.join("state.meta.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), PersistError> {
        let path = self.root.join("integrity").join("manifest.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

fn camera_file(key: &str) -> Result<String, PersistError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(PersistError::InvalidKey(key.to_owned()));
    }
    Ok(format!("{key}.cbor"))
}

fn verify(entry: &ManifestEntry, data: &[u8]) -> Result<(), PersistError> {
    let actual = sha256_hex(data);
    if actual != entry.sha256 {
        return Err(PersistError::IntegrityMismatch {
            file: entry.filename.clone(),
            expected: entry.sha256.clone(),
            actual,
        });
    }
    Ok(())
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(zoom: i32) -> CameraSnapshot {
        CameraSnapshot {
            latitude: 37.5,
            longitude: 127.0,
            zoom_level: zoom,
            tilt_angle: -0.75,
            rotation_angle: -2.5,
            height: 310.25,
        }
    }

    #[test]
    fn open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SavedStateStore::open(tmp.path().join("state")).unwrap();
        assert_eq!(store.meta().camera_count, 0);
        assert!(store.root().join("camera").is_dir());
        assert!(store.root().join("integrity").join("manifest.json").is_file());
        assert!(store.root().join("state.meta.json").is_file());
    }

    #[test]
    fn save_and_reload_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("state");
        let mut store = SavedStateStore::open(&dir).unwrap();
        store.save_camera("main", &snapshot(12)).unwrap();
        store.save_camera("main", &snapshot(13)).unwrap();
        store.save_camera("inset", &snapshot(7)).unwrap();
        assert_eq!(store.meta().camera_count, 2);

        let reopened = SavedStateStore::open(&dir).unwrap();
        assert_eq!(reopened.keys(), vec!["inset".to_owned(), "main".to_owned()]);
        assert_eq!(reopened.load_camera("main").unwrap(), Some(snapshot(13)));
        assert_eq!(reopened.load_camera("missing").unwrap(), None);
        reopened.verify_integrity().unwrap();
    }

    #[test]
    fn tampered_file_fails_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SavedStateStore::open(tmp.path()).unwrap();
        store.save_camera("main", &snapshot(12)).unwrap();

        let path = store.root().join("camera").join("main.cbor");
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let err = store.load_camera("main").unwrap_err();
        assert!(matches!(err, PersistError::IntegrityMismatch { .. }));
        assert!(store.verify_integrity().is_err());
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        SavedStateStore::open(tmp.path()).unwrap();
        let meta = StoreMeta {
            schema_version: 99,
            camera_count: 0,
        };
        std::fs::write(
            tmp.path().join("state.meta.json"),
            serde_json::to_vec(&meta).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            SavedStateStore::open(tmp.path()),
            Err(PersistError::SchemaMismatch {
                file_version: 99,
                ..
            })
        ));
    }

    #[test]
    fn remove_drops_file_and_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SavedStateStore::open(tmp.path()).unwrap();
        store.save_camera("main", &snapshot(12)).unwrap();
        assert!(store.remove_camera("main").unwrap());
        assert!(!store.remove_camera("main").unwrap());
        assert!(store.keys().is_empty());
        assert_eq!(store.meta().camera_count, 0);
        store.verify_integrity().unwrap();
    }

    #[test]
    fn stray_file_fails_verification() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SavedStateStore::open(tmp.path()).unwrap();
        std::fs::write(store.root().join("camera").join("ghost.cbor"), b"x").unwrap();
        assert!(matches!(
            store.verify_integrity(),
            Err(PersistError::Untracked(_))
        ));
    }

    #[test]
    fn keys_are_validated() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SavedStateStore::open(tmp.path()).unwrap();
        for bad in ["", "../escape", ".hidden", "a/b"] {
            assert!(matches!(
                store.save_camera(bad, &snapshot(1)),
                Err(PersistError::InvalidKey(_))
            ));
        }
    }
}
