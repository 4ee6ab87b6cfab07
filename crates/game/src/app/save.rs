use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cove_engine::sha256_hex;
use cove_engine::world::{PlayerProgress, PROGRESS_VERSION};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const PROGRESS_FILE: &str = "progress.json";

/// On-disk wrapper: the digest covers the compact JSON of `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SaveEnvelope {
    save_version: u32,
    payload: PlayerProgress,
    sha256: String,
}

#[derive(Debug, Error)]
pub(crate) enum SaveError {
    #[error("failed to read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to parse save json at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported save version at {field}: expected {expected}, got {actual}")]
    VersionMismatch {
        field: &'static str,
        expected: u32,
        actual: u32,
    },
    #[error("save digest mismatch; the file is corrupt or was edited")]
    DigestMismatch,
}

/// Progress persistence under `<root>/saves/`.
#[derive(Debug, Clone)]
pub(crate) struct SaveStore {
    path: PathBuf,
}

impl SaveStore {
    pub(crate) fn new(saves_dir: &Path) -> Self {
        Self {
            path: saves_dir.join(PROGRESS_FILE),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no save exists yet.
    pub(crate) fn load(&self) -> Result<Option<PlayerProgress>, SaveError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SaveError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        decode_progress(&raw).map(Some)
    }

    /// Falls back to `fresh` when the save is missing or unusable. A damaged
    /// file is left in place until the next successful write replaces it.
    pub(crate) fn load_or_default(&self, fresh: PlayerProgress) -> PlayerProgress {
        match self.load() {
            Ok(Some(progress)) => {
                info!(
                    path = %self.path.display(),
                    max_level = progress.max_level,
                    total_score = progress.total_score(),
                    "save_loaded"
                );
                progress
            }
            Ok(None) => {
                info!(path = %self.path.display(), "save_missing_using_defaults");
                fresh
            }
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "save_load_failed");
                fresh
            }
        }
    }

    pub(crate) fn save(&self, progress: &PlayerProgress) -> Result<(), SaveError> {
        let text = encode_progress(progress)?;
        write_text_atomic(&self.path, &text).map_err(|source| SaveError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(
            path = %self.path.display(),
            max_level = progress.max_level,
            total_score = progress.total_score(),
            "save_written"
        );
        Ok(())
    }
}

fn encode_progress(progress: &PlayerProgress) -> Result<String, SaveError> {
    let envelope = SaveEnvelope {
        save_version: PROGRESS_VERSION,
        payload: progress.clone(),
        sha256: payload_digest(progress)?,
    };
    serde_json::to_string_pretty(&envelope).map_err(SaveError::Encode)
}

fn decode_progress(raw: &str) -> Result<PlayerProgress, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let envelope = serde_path_to_error::deserialize::<_, SaveEnvelope>(&mut deserializer)
        .map_err(|error| {
            let path = error.path().to_string();
            SaveError::Decode {
                path,
                source: error.into_inner(),
            }
        })?;

    if envelope.save_version != PROGRESS_VERSION {
        return Err(SaveError::VersionMismatch {
            field: "save_version",
            expected: PROGRESS_VERSION,
            actual: envelope.save_version,
        });
    }
    if envelope.payload.version != PROGRESS_VERSION {
        return Err(SaveError::VersionMismatch {
            field: "payload.version",
            expected: PROGRESS_VERSION,
            actual: envelope.payload.version,
        });
    }
    if payload_digest(&envelope.payload)? != envelope.sha256 {
        return Err(SaveError::DigestMismatch);
    }

    let mut progress = envelope.payload;
    progress.preferences = progress.preferences.clamped();
    progress.max_level = progress.max_level.max(1);
    progress.current_level = progress.current_level.clamp(1, progress.max_level);
    Ok(progress)
}

fn payload_digest(progress: &PlayerProgress) -> Result<String, SaveError> {
    let compact = serde_json::to_vec(progress).map_err(SaveError::Encode)?;
    Ok(sha256_hex(&compact))
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(PROGRESS_FILE);
    path.with_file_name(format!("{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use cove_engine::world::{InitialState, LevelStats};
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    fn sample_progress() -> PlayerProgress {
        let mut progress = PlayerProgress::default();
        progress.update_level_data(
            1,
            &LevelStats {
                enemies_killed: 2,
                gold_coins: 3,
                silver_coins: 1,
                ..LevelStats::default()
            },
            &InitialState {
                enemies: 4,
                gold_coins: 3,
                silver_coins: 2,
            },
        );
        progress.unlock_up_to(2);
        progress.current_level = 2;
        progress
    }

    fn edit_saved_json(store: &SaveStore, edit: impl FnOnce(&mut Value)) {
        let raw = fs::read_to_string(store.path()).expect("read");
        let mut value: Value = serde_json::from_str(&raw).expect("json");
        edit(&mut value);
        fs::write(store.path(), serde_json::to_string(&value).expect("encode")).expect("write");
    }

    #[test]
    fn save_then_load_restores_progress() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(temp.path());
        let progress = sample_progress();

        store.save(&progress).expect("save");
        let loaded = store.load().expect("load").expect("present");

        assert_eq!(loaded, progress);
        assert!(!temp_path_for(store.path()).exists());
    }

    #[test]
    fn missing_file_is_none() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(&temp.path().join("nested"));
        assert!(store.load().expect("load").is_none());
        let fresh = store.load_or_default(PlayerProgress::with_level_count(4));
        assert_eq!(fresh.level_count(), 4);
    }

    #[test]
    fn edited_payload_fails_digest() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(temp.path());
        store.save(&sample_progress()).expect("save");

        edit_saved_json(&store, |value| value["payload"]["max_level"] = Value::from(6));

        let error = store.load().expect_err("tampered");
        assert!(matches!(error, SaveError::DigestMismatch));
    }

    #[test]
    fn wrong_envelope_version_is_rejected() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(temp.path());
        store.save(&sample_progress()).expect("save");

        edit_saved_json(&store, |value| value["save_version"] = Value::from(9));

        let error = store.load().expect_err("version");
        assert!(matches!(
            error,
            SaveError::VersionMismatch {
                field: "save_version",
                actual: 9,
                ..
            }
        ));
    }

    #[test]
    fn decode_error_reports_field_path() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(temp.path());
        store.save(&sample_progress()).expect("save");

        edit_saved_json(&store, |value| {
            value["payload"]["preferences"]["music_volume"] = Value::from("loud")
        });

        match store.load().expect_err("decode") {
            SaveError::Decode { path, .. } => {
                assert_eq!(path, "payload.preferences.music_volume")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(temp.path());
        fs::write(store.path(), "{ not json").expect("write");

        let progress = store.load_or_default(PlayerProgress::with_level_count(6));
        assert_eq!(progress, PlayerProgress::with_level_count(6));
    }

    #[test]
    fn existing_save_keeps_its_health_cap() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(temp.path());
        let mut saved = sample_progress();
        saved.max_health = 140;
        store.save(&saved).expect("save");

        let mut fresh = PlayerProgress::with_level_count(6);
        fresh.max_health = 80;
        assert_eq!(store.load_or_default(fresh).max_health, 140);
    }

    #[test]
    fn save_overwrites_previous_file() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::new(temp.path());
        store.save(&PlayerProgress::default()).expect("first");
        let progress = sample_progress();
        store.save(&progress).expect("second");

        assert_eq!(store.load().expect("load"), Some(progress));
    }
}
