use crate::domain::model::{Source, SourceState};
use crate::domain::ports::{SourceStore, SourceUpdate};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// 狀態檔中每個來源的一筆紀錄
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredState {
    enabled: bool,
    #[serde(default)]
    state: SourceState,
}

/// 來源定義來自設定檔，排程狀態與 enabled 存在 JSON 狀態檔。
///
/// 狀態檔不存在時視為全新啟動；設定檔中已刪除的來源，其狀態紀錄會保留在檔案裡。
#[derive(Debug)]
pub struct FileSourceStore {
    definitions: Vec<Source>,
    state_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSourceStore {
    pub fn new(definitions: Vec<Source>, state_path: impl Into<PathBuf>) -> Self {
        Self {
            definitions,
            state_path: state_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_states(&self) -> Result<BTreeMap<String, StoredState>> {
        if !self.state_path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.state_path)?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&data).map_err(|e| IngestError::StoreError {
            message: format!("cannot parse state file {}: {}", self.state_path.display(), e),
        })
    }

    fn write_states(&self, states: &BTreeMap<String, StoredState>) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(states)?;
        // 先寫暫存檔再改名，避免寫到一半的狀態檔
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &self.state_path)?;
        Ok(())
    }
}

#[async_trait]
impl SourceStore for FileSourceStore {
    async fn load_sources(&self) -> Result<Vec<Source>> {
        let states = self.read_states()?;
        Ok(self
            .definitions
            .iter()
            .cloned()
            .map(|mut source| {
                if let Some(stored) = states.get(&source.id) {
                    source.enabled = stored.enabled;
                    source.state = stored.state.clone();
                }
                source
            })
            .collect())
    }

    async fn save_updates(&self, updates: &[SourceUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().map_err(|_| IngestError::StoreError {
            message: "state file lock poisoned".to_string(),
        })?;

        let mut states = self.read_states()?;
        for update in updates {
            states.insert(
                update.source_id.clone(),
                StoredState {
                    enabled: update.enabled,
                    state: update.state.clone(),
                },
            );
        }
        self.write_states(&states)?;

        debug!(
            path = %self.state_path.display(),
            updated = updates.len(),
            "💾 Source state saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn definitions() -> Vec<Source> {
        vec![
            Source::new("a", "REST", "https://a.example.com"),
            Source::new("b", "GRAPHQL", "https://b.example.com/graphql"),
        ]
    }

    #[tokio::test]
    async fn test_missing_state_file_uses_definitions() {
        let dir = TempDir::new().unwrap();
        let store = FileSourceStore::new(definitions(), dir.path().join("state/sources.json"));

        let sources = store.load_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| s.enabled && s.state == SourceState::default()));
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/sources.json");
        let store = FileSourceStore::new(definitions(), &path);

        let now = Utc::now();
        let mut update = SourceUpdate::from_source(&definitions()[0]);
        update.enabled = false;
        update.state.consecutive_failures = 5;
        update.state.last_run_at = Some(now);
        store.save_updates(&[update]).await.unwrap();
        assert!(path.exists());

        let reopened = FileSourceStore::new(definitions(), &path);
        let sources = reopened.load_sources().await.unwrap();
        let a = sources.iter().find(|s| s.id == "a").unwrap();
        assert!(!a.enabled);
        assert_eq!(a.state.consecutive_failures, 5);
        assert_eq!(a.state.last_run_at, Some(now));

        let b = sources.iter().find(|s| s.id == "b").unwrap();
        assert!(b.enabled);
        assert_eq!(b.state.total_runs_count, 0);
    }

    #[tokio::test]
    async fn test_corrupt_state_file_is_store_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileSourceStore::new(definitions(), &path);
        let err = store.load_sources().await.unwrap_err();
        assert!(matches!(err, IngestError::StoreError { .. }));
    }
}
