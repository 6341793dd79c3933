use crate::domain::model::Source;
use crate::domain::ports::RecordSink;
use crate::domain::result::PaginatedFetchResult;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// 只記錄摘要，不保存紀錄
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl RecordSink for LogSink {
    async fn accept(&self, source: &Source, result: &PaginatedFetchResult) -> Result<()> {
        info!(
            source_id = %source.id,
            pages = result.total_pages,
            records = result.total_records,
            "📥 Records received"
        );
        Ok(())
    }
}

/// 每筆紀錄一行 JSON，附加到 `<output_dir>/<source_id>.jsonl`
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    output_dir: PathBuf,
}

impl JsonLinesSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        let file_name: String = source_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.output_dir.join(format!("{}.jsonl", file_name))
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn accept(&self, source: &Source, result: &PaginatedFetchResult) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(&source.id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        let mut written = 0usize;
        for record in result.records() {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;

        info!(
            source_id = %source.id,
            records = written,
            path = %path.display(),
            "💾 Records written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::FetchResult;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn result(records: Vec<serde_json::Value>) -> PaginatedFetchResult {
        let page = FetchResult {
            status_code: 200,
            body: String::new(),
            record_count: records.len(),
            records,
            response_size: 0,
            headers: HashMap::new(),
            url: "https://api.example.com".to_string(),
        };
        PaginatedFetchResult {
            total_pages: 1,
            total_records: page.record_count,
            pages: vec![page],
            success: true,
            error_message: None,
            total_elapsed: Duration::ZERO,
            page_elapsed: vec![Duration::ZERO],
            max_pages_reached: false,
        }
    }

    #[tokio::test]
    async fn test_json_lines_appends_records() {
        let dir = TempDir::new().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("out"));
        let source = Source::new("users/v2", "REST", "https://api.example.com");

        sink.accept(&source, &result(vec![json!({"id": 1}), json!({"id": 2})]))
            .await
            .unwrap();
        sink.accept(&source, &result(vec![json!({"id": 3})])).await.unwrap();

        let path = sink.path_for(&source.id);
        assert!(path.ends_with("users_v2.jsonl"));
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"id":1}"#, r#"{"id":2}"#, r#"{"id":3}"#]);
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let source = Source::new("a", "REST", "https://api.example.com");
        assert!(LogSink.accept(&source, &result(vec![json!(1)])).await.is_ok());
    }
}
