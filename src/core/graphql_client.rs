use crate::core::collector::PageCollector;
use crate::core::http::{HttpPageFetcher, PageRequest};
use crate::core::rate_limiter::RateLimiter;
use crate::core::response::{collect_records, cursor_value, extract_path, graphql_error_message, unwrap_relay_edges};
use crate::domain::model::{HttpMethod, PaginationType, ProtocolType, Source};
use crate::domain::pagination::PaginationConfig;
use crate::domain::ports::{AuthApplier, PaginationClient};
use crate::domain::result::{FetchResult, PaginatedFetchResult};
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::validate_required_field;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const INTROSPECTION_QUERY: &str = "query { __typename }";

/// 一頁 GraphQL 回應，`data` 保留下來給 pageInfo 查詢
struct GraphQLPage {
    result: FetchResult,
    data: Value,
}

/// GraphQL 分頁客戶端：每頁一個 POST（query + 合併後的 variables）
pub struct GraphQLPaginationClient {
    fetcher: HttpPageFetcher,
}

/// 分頁變數在同名時覆蓋來源設定的靜態變數
pub fn merge_variables(static_vars: &Map<String, Value>, pagination_vars: Map<String, Value>) -> Map<String, Value> {
    let mut merged = static_vars.clone();
    merged.extend(pagination_vars);
    merged
}

/// 找出 pageInfo：優先使用設定的路徑，否則找 response_path 的同層或自身底下的 `pageInfo`
pub fn locate_page_info<'a>(data: &'a Value, config: &PaginationConfig, response_path: Option<&str>) -> Option<&'a Value> {
    if let Some(path) = config.page_info_path.as_deref() {
        return extract_path(data, Some(path));
    }

    let mut candidates = Vec::new();
    if let Some(path) = response_path.map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((parent, _)) = path.rsplit_once('.') {
            candidates.push(format!("{}.pageInfo", parent));
        }
        candidates.push(format!("{}.pageInfo", path));
    }
    candidates.push("pageInfo".to_string());

    candidates
        .iter()
        .find_map(|candidate| extract_path(data, Some(candidate)))
}

impl GraphQLPaginationClient {
    pub fn new(client: Client, auth: Arc<dyn AuthApplier>) -> Self {
        Self {
            fetcher: HttpPageFetcher::new(client, auth),
        }
    }

    async fn fetch_page(
        &self,
        source: &Source,
        query: &str,
        variables: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<GraphQLPage> {
        let request = PageRequest::new(source.endpoint.clone(), Vec::new())
            .with_json_body(json!({ "query": query, "variables": variables }));

        let raw = self
            .fetcher
            .send(source, HttpMethod::Post, &request, cancel)
            .await?;
        let body = raw.json()?;

        // HTTP 200 也可能帶 errors
        if let Some(message) = graphql_error_message(&body) {
            return Err(IngestError::protocol(format!("GraphQL errors: {}", message)));
        }

        let data = body.get("data").cloned().unwrap_or(Value::Null);
        let records = unwrap_relay_edges(collect_records(extract_path(
            &data,
            source.response_path.as_deref(),
        )));

        let result = FetchResult {
            status_code: raw.status,
            response_size: raw.size(),
            record_count: records.len(),
            records,
            headers: raw.headers,
            body: raw.body,
            url: raw.url,
        };

        Ok(GraphQLPage { result, data })
    }

    /// 協定錯誤讓整次呼叫失敗；傳輸錯誤依頁次處理
    fn handle_error(collector: &mut PageCollector, error: &IngestError) {
        if matches!(error, IngestError::ProtocolError { .. }) {
            collector.fail(error);
        } else {
            collector.page_failed(error);
        }
    }

    async fn fetch_single(
        &self,
        source: &Source,
        query: &str,
        config: &PaginationConfig,
        cancel: &CancellationToken,
    ) -> PaginatedFetchResult {
        let mut collector = PageCollector::new(&source.id, config.effective_max_pages());

        let started = Instant::now();
        match self
            .fetch_page(source, query, source.graphql_variables.clone(), cancel)
            .await
        {
            Ok(page) => collector.push(page.result, started.elapsed()),
            Err(e) => Self::handle_error(&mut collector, &e),
        }

        collector.finish()
    }

    /// Relay 慣例：`first`/`after` 變數，依 pageInfo.hasNextPage / endCursor 前進
    async fn fetch_cursor(
        &self,
        source: &Source,
        query: &str,
        config: &PaginationConfig,
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

            let mut pagination_vars = Map::new();
            pagination_vars.insert(config.first_variable.clone(), json!(config.limit));
            if let Some(cursor) = &cursor {
                pagination_vars.insert(config.after_variable.clone(), json!(cursor));
            }
            let variables = merge_variables(&source.graphql_variables, pagination_vars);

            let started = Instant::now();
            match self.fetch_page(source, query, variables, cancel).await {
                Ok(page) => {
                    let page_info = locate_page_info(&page.data, config, source.response_path.as_deref());
                    let has_next_page = page_info
                        .and_then(|info| info.get("hasNextPage"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    let end_cursor = cursor_value(page_info.and_then(|info| info.get("endCursor")));
                    collector.push(page.result, started.elapsed());

                    if !has_next_page {
                        break;
                    }
                    match end_cursor {
                        None => {
                            tracing::warn!(source_id = %source.id, "⚠️ hasNextPage is true but endCursor is missing, stopping");
                            break;
                        }
                        Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                            tracing::warn!(source_id = %source.id, cursor = %next, "⚠️ Upstream repeated the same endCursor, stopping");
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
                    Self::handle_error(&mut collector, &e);
                    break;
                }
            }
        }

        collector.finish()
    }

    /// 與 REST offset 相同，只是 offset/limit 放在 variables 裡
    async fn fetch_offset(
        &self,
        source: &Source,
        query: &str,
        config: &PaginationConfig,
        cancel: &CancellationToken,
    ) -> PaginatedFetchResult {
        let mut collector = PageCollector::new(&source.id, config.effective_max_pages());
        let limiter = RateLimiter::for_source(source, config);
        let mut offset: u64 = 0;

        loop {
            if !collector.is_first_page() && !limiter.wait(cancel).await {
                collector.page_failed(&IngestError::Cancelled);
                break;
            }

            let mut pagination_vars = Map::new();
            pagination_vars.insert(config.offset_param.clone(), json!(offset));
            pagination_vars.insert(config.limit_param.clone(), json!(config.limit));
            let variables = merge_variables(&source.graphql_variables, pagination_vars);

            let started = Instant::now();
            match self.fetch_page(source, query, variables, cancel).await {
                Ok(page) => {
                    let count = page.result.record_count;
                    collector.push(page.result, started.elapsed());

                    if config.is_last_page(count) {
                        break;
                    }
                    if collector.is_full() {
                        collector.mark_max_pages_reached();
                        break;
                    }
                    offset += config.limit as u64;
                }
                Err(e) => {
                    Self::handle_error(&mut collector, &e);
                    break;
                }
            }
        }

        collector.finish()
    }
}

#[async_trait]
impl PaginationClient for GraphQLPaginationClient {
    fn protocol(&self) -> ProtocolType {
        ProtocolType::GraphQL
    }

    async fn fetch_all_pages_with_cancel(
        &self,
        source: &Source,
        pagination_type: PaginationType,
        config: &PaginationConfig,
        cancel: &CancellationToken,
    ) -> Result<PaginatedFetchResult> {
        let query = validate_required_field("graphql_query", &source.graphql_query)?;

        tracing::debug!(
            source_id = %source.id,
            pagination = %pagination_type,
            max_pages = config.effective_max_pages(),
            "📥 Starting GraphQL fetch"
        );

        let result = match pagination_type {
            PaginationType::None => self.fetch_single(source, query, config, cancel).await,
            PaginationType::Cursor => self.fetch_cursor(source, query, config, cancel).await,
            PaginationType::Offset => self.fetch_offset(source, query, config, cancel).await,
            PaginationType::Page | PaginationType::LinkHeader => {
                return Err(IngestError::UnsupportedPagination {
                    protocol: ProtocolType::GraphQL.to_string(),
                    pagination: pagination_type.to_string(),
                })
            }
        };

        tracing::info!(
            source_id = %source.id,
            pages = result.total_pages,
            records = result.total_records,
            elapsed_ms = result.total_elapsed.as_millis() as u64,
            success = result.success,
            "📥 GraphQL fetch finished"
        );

        Ok(result)
    }

    async fn test_connection(&self, source: &Source) -> Result<bool> {
        let cancel = CancellationToken::new();

        match self
            .fetch_page(source, INTROSPECTION_QUERY, Map::new(), &cancel)
            .await
        {
            Ok(page) => {
                tracing::info!(source_id = %source.id, status = page.result.status_code, "✅ GraphQL connection test succeeded");
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(source_id = %source.id, error = %e, "❌ GraphQL connection test failed");
                Ok(false)
            }
        }
    }
}
