use crate::core::collector::PageCollector;
use crate::core::http::{HttpPageFetcher, PageRequest, RawResponse};
use crate::core::rate_limiter::RateLimiter;
use crate::core::response::{collect_records, cursor_value, extract_path, parse_link_header, resolve_link};
use crate::domain::model::{PaginationType, ProtocolType, Source};
use crate::domain::pagination::PaginationConfig;
use crate::domain::ports::{AuthApplier, PaginationClient};
use crate::domain::result::{FetchResult, PaginatedFetchResult};
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::validate_required_field;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberedMode {
    Offset,
    Page,
}

/// REST 分頁客戶端：None / Offset / Page / Cursor / LinkHeader
pub struct RestPaginationClient {
    fetcher: HttpPageFetcher,
}

impl RestPaginationClient {
    pub fn new(client: Client, auth: Arc<dyn AuthApplier>) -> Self {
        Self {
            fetcher: HttpPageFetcher::new(client, auth),
        }
    }

    async fn fetch_page(
        &self,
        source: &Source,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<(FetchResult, serde_json::Value)> {
        let raw = self.fetcher.send(source, source.method, request, cancel).await?;
        let json = raw.json()?;
        let records = collect_records(extract_path(&json, source.response_path.as_deref()));
        Ok((to_fetch_result(raw, records), json))
    }

    async fn fetch_single(
        &self,
        source: &Source,
        config: &PaginationConfig,
        cancel: &CancellationToken,
    ) -> PaginatedFetchResult {
        let mut collector = PageCollector::new(&source.id, config.effective_max_pages());
        let request = PageRequest::new(source.endpoint.clone(), Vec::new());

        let started = Instant::now();
        match self.fetch_page(source, &request, cancel).await {
            Ok((page, _)) => collector.push(page, started.elapsed()),
            Err(e) => collector.page_failed(&e),
        }

        collector.finish()
    }

    /// Offset 與 Page 共用同一個迴圈，只差在遞增的參數
    async fn fetch_numbered(
        &self,
        source: &Source,
        config: &PaginationConfig,
        mode: NumberedMode,
        cancel: &CancellationToken,
    ) -> PaginatedFetchResult {
        let mut collector = PageCollector::new(&source.id, config.effective_max_pages());
        let limiter = RateLimiter::for_source(source, config);

        let (param, mut position, step) = match mode {
            NumberedMode::Offset => (&config.offset_param, 0u64, config.limit as u64),
            NumberedMode::Page => (&config.page_param, config.start_page as u64, 1u64),
        };

        loop {
            if !collector.is_first_page() && !limiter.wait(cancel).await {
                collector.page_failed(&IngestError::Cancelled);
                break;
            }

            let request = PageRequest::new(
                source.endpoint.clone(),
                vec![
                    (param.clone(), position.to_string()),
                    (config.limit_param.clone(), config.limit.to_string()),
                ],
            );

            let started = Instant::now();
            match self.fetch_page(source, &request, cancel).await {
                Ok((page, _)) => {
                    let count = page.record_count;
                    collector.push(page, started.elapsed());

                    if config.is_last_page(count) {
                        break;
                    }
                    if collector.is_full() {
                        collector.mark_max_pages_reached();
                        break;
                    }
                    position += step;
                }
                Err(e) => {
                    collector.page_failed(&e);
                    break;
                }
            }
        }

        collector.finish()
    }

    async fn fetch_cursor(
        &self,
        source: &Source,
        config: &PaginationConfig,
        cursor_path: &str,
        cancel: &CancellationToken,
    ) -> PaginatedFetchResult {
        let mut collector = PageCollector::new(&source.id, config.effective_max_pages());
        let limiter = RateLimiter::for_source(source, config);
        let mut cursor: Option<String> = None;

        loop {
            if !collector.is_first_page() && !limiter.wait(cancel).await {
                collector.page_failed(&IngestError::Cancelled);
                break;
            }

            let mut query = vec![(config.limit_param.clone(), config.limit.to_string())];
            if let Some(cursor) = &cursor {
                query.push((config.cursor_param.clone(), cursor.clone()));
            }
            let request = PageRequest::new(source.endpoint.clone(), query);

            let started = Instant::now();
            match self.fetch_page(source, &request, cancel).await {
                Ok((page, json)) => {
                    let next = cursor_value(extract_path(&json, Some(cursor_path)));
                    collector.push(page, started.elapsed());

                    match next {
                        None => break,
                        Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                            tracing::warn!(source_id = %source.id, cursor = %next, "⚠️ Upstream repeated the same cursor, stopping");
                            break;
                        }
                        Some(next) => {
                            if collector.is_full() {
                                collector.mark_max_pages_reached();
                                break;
                            }
                            cursor = Some(next);
                        }
                    }
                }
                Err(e) => {
                    collector.page_failed(&e);
                    break;
                }
            }
        }

        collector.finish()
    }

    async fn fetch_link_header(
        &self,
        source: &Source,
        config: &PaginationConfig,
        cancel: &CancellationToken,
    ) -> PaginatedFetchResult {
        let mut collector = PageCollector::new(&source.id, config.effective_max_pages());
        let limiter = RateLimiter::for_source(source, config);
        let mut request = PageRequest::new(
            source.endpoint.clone(),
            vec![(config.limit_param.clone(), config.limit.to_string())],
        );

        loop {
            if !collector.is_first_page() && !limiter.wait(cancel).await {
                collector.page_failed(&IngestError::Cancelled);
                break;
            }

            let started = Instant::now();
            match self.fetch_page(source, &request, cancel).await {
                Ok((page, _)) => {
                    let next = page
                        .header("link")
                        .and_then(|header| parse_link_header(header, &config.link_rel))
                        .map(|link| resolve_link(&page.url, &link));
                    let current_url = page.url.clone();
                    collector.push(page, started.elapsed());

                    match next {
                        None => break,
                        Some(next) if next == current_url => {
                            tracing::warn!(source_id = %source.id, url = %next, "⚠️ Link header points at the current page, stopping");
                            break;
                        }
                        Some(next) => {
                            if collector.is_full() {
                                collector.mark_max_pages_reached();
                                break;
                            }
                            request = PageRequest::absolute(next);
                        }
                    }
                }
                Err(e) => {
                    collector.page_failed(&e);
                    break;
                }
            }
        }

        collector.finish()
    }
}

fn to_fetch_result(raw: RawResponse, records: Vec<serde_json::Value>) -> FetchResult {
    FetchResult {
        status_code: raw.status,
        response_size: raw.size(),
        record_count: records.len(),
        records,
        headers: raw.headers,
        body: raw.body,
        url: raw.url,
    }
}

#[async_trait]
impl PaginationClient for RestPaginationClient {
    fn protocol(&self) -> ProtocolType {
        ProtocolType::Rest
    }

    async fn fetch_all_pages_with_cancel(
        &self,
        source: &Source,
        pagination_type: PaginationType,
        config: &PaginationConfig,
        cancel: &CancellationToken,
    ) -> Result<PaginatedFetchResult> {
        tracing::debug!(
            source_id = %source.id,
            pagination = %pagination_type,
            max_pages = config.effective_max_pages(),
            "📥 Starting REST fetch"
        );

        let result = match pagination_type {
            PaginationType::None => self.fetch_single(source, config, cancel).await,
            PaginationType::Offset => {
                self.fetch_numbered(source, config, NumberedMode::Offset, cancel)
                    .await
            }
            PaginationType::Page => {
                self.fetch_numbered(source, config, NumberedMode::Page, cancel)
                    .await
            }
            PaginationType::Cursor => {
                let cursor_path =
                    validate_required_field("pagination.cursor_path", &config.cursor_path)?;
                self.fetch_cursor(source, config, cursor_path, cancel).await
            }
            PaginationType::LinkHeader => self.fetch_link_header(source, config, cancel).await,
        };

        tracing::info!(
            source_id = %source.id,
            pages = result.total_pages,
            records = result.total_records,
            elapsed_ms = result.total_elapsed.as_millis() as u64,
            success = result.success,
            "📥 REST fetch finished"
        );

        Ok(result)
    }

    async fn test_connection(&self, source: &Source) -> Result<bool> {
        let request = PageRequest::new(source.endpoint.clone(), Vec::new());
        let cancel = CancellationToken::new();

        match self.fetcher.send(source, source.method, &request, &cancel).await {
            Ok(raw) => {
                tracing::info!(source_id = %source.id, status = raw.status, "✅ Connection test succeeded");
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(source_id = %source.id, error = %e, "❌ Connection test failed");
                Ok(false)
            }
        }
    }
}
