use crate::domain::result::{FetchResult, PaginatedFetchResult};
use crate::utils::error::IngestError;
use std::time::{Duration, Instant};

/// 累積各頁結果，並套用頁數上限與失敗規則
pub struct PageCollector {
    source_id: String,
    cap: usize,
    started: Instant,
    pages: Vec<FetchResult>,
    page_elapsed: Vec<Duration>,
    success: bool,
    error_message: Option<String>,
    max_pages_reached: bool,
}

impl PageCollector {
    pub fn new(source_id: &str, cap: usize) -> Self {
        Self {
            source_id: source_id.to_string(),
            cap,
            started: Instant::now(),
            pages: Vec::new(),
            page_elapsed: Vec::new(),
            success: true,
            error_message: None,
            max_pages_reached: false,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pages.len() >= self.cap
    }

    pub fn push(&mut self, page: FetchResult, elapsed: Duration) {
        tracing::debug!(
            source_id = %self.source_id,
            page = self.pages.len() + 1,
            records = page.record_count,
            bytes = page.response_size,
            elapsed_ms = elapsed.as_millis() as u64,
            "📄 Page fetched"
        );
        self.pages.push(page);
        self.page_elapsed.push(elapsed);
    }

    pub fn mark_max_pages_reached(&mut self) {
        tracing::warn!(
            source_id = %self.source_id,
            max_pages = self.cap,
            "⚠️ Page limit reached, more data may remain upstream"
        );
        self.max_pages_reached = true;
    }

    /// 單頁失敗：第一頁失敗則整體失敗，之後的頁面只截斷結果
    pub fn page_failed(&mut self, error: &IngestError) {
        if self.pages.is_empty() {
            tracing::error!(source_id = %self.source_id, error = %error, "❌ First page failed");
            self.success = false;
            self.error_message = Some(error.to_string());
        } else if matches!(error, IngestError::Cancelled) {
            tracing::warn!(
                source_id = %self.source_id,
                pages = self.pages.len(),
                "🛑 Ingestion cancelled, returning pages fetched so far"
            );
        } else {
            tracing::warn!(
                source_id = %self.source_id,
                pages = self.pages.len(),
                error = %error,
                "⚠️ Page fetch failed, keeping partial result"
            );
        }
    }

    /// 協定層錯誤（GraphQL errors）不論第幾頁都讓整次呼叫失敗
    pub fn fail(&mut self, error: &IngestError) {
        tracing::error!(
            source_id = %self.source_id,
            pages = self.pages.len(),
            error = %error,
            "❌ Ingestion failed"
        );
        self.success = false;
        self.error_message = Some(error.to_string());
    }

    pub fn finish(self) -> PaginatedFetchResult {
        let total_records = self.pages.iter().map(|p| p.record_count).sum();
        PaginatedFetchResult {
            total_pages: self.pages.len(),
            total_records,
            pages: self.pages,
            success: self.success,
            error_message: self.error_message,
            total_elapsed: self.started.elapsed(),
            page_elapsed: self.page_elapsed,
            max_pages_reached: self.max_pages_reached,
        }
    }
}
