use crate::domain::model::Source;
use crate::domain::ports::{SourceStore, SourceUpdate};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// 記憶體內的來源儲存；測試與單次執行（`fetch`、`tick`）用
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    sources: Mutex<Vec<Source>>,
    saves: Mutex<usize>,
}

impl MemorySourceStore {
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            sources: Mutex::new(sources),
            saves: Mutex::new(0),
        }
    }

    pub fn get(&self, source_id: &str) -> Option<Source> {
        self.sources
            .lock()
            .ok()?
            .iter()
            .find(|source| source.id == source_id)
            .cloned()
    }

    /// `save_updates` 被呼叫的次數
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|count| *count).unwrap_or(0)
    }
}

fn poisoned() -> IngestError {
    IngestError::StoreError {
        message: "memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn load_sources(&self) -> Result<Vec<Source>> {
        Ok(self.sources.lock().map_err(|_| poisoned())?.clone())
    }

    async fn save_updates(&self, updates: &[SourceUpdate]) -> Result<()> {
        let mut sources = self.sources.lock().map_err(|_| poisoned())?;
        for update in updates {
            if let Some(source) = sources.iter_mut().find(|s| s.id == update.source_id) {
                source.enabled = update.enabled;
                source.state = update.state.clone();
            }
        }
        *self.saves.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }
}
