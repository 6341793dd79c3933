use crate::domain::model::{HttpMethod, Source};
use crate::domain::ports::AuthApplier;
use crate::utils::error::{IngestError, Result};
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 單頁請求描述
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub url: String,
    /// 分頁參數，同名時覆蓋來源的靜態查詢參數
    pub query: Vec<(String, String)>,
    /// LinkHeader 後續頁面的網址已帶參數，不再附加靜態查詢參數
    pub include_static_query: bool,
    pub json_body: Option<serde_json::Value>,
}

impl PageRequest {
    pub fn new(url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            query,
            include_static_query: true,
            json_body: None,
        }
    }

    pub fn absolute(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            include_static_query: false,
            json_body: None,
        }
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.json_body = Some(body);
        self
    }
}

/// 原始 HTTP 回應（只有 2xx 會走到這裡）
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&self.body)
            .map_err(|e| IngestError::protocol(format!("Response body is not valid JSON: {}", e)))
    }
}

const ERROR_BODY_PREVIEW: usize = 200;

/// REST 與 GraphQL 共用的送出邏輯：標頭、查詢參數、逾時、認證與取消
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: Client,
    auth: Arc<dyn AuthApplier>,
}

impl HttpPageFetcher {
    pub fn new(client: Client, auth: Arc<dyn AuthApplier>) -> Self {
        Self { client, auth }
    }

    pub fn build(
        &self,
        source: &Source,
        method: HttpMethod,
        page: &PageRequest,
    ) -> Result<reqwest::RequestBuilder> {
        let mut request = self.client.request(method.into(), &page.url);

        for (key, value) in &source.headers {
            request = request.header(key, value);
        }

        let mut query: BTreeMap<&str, &str> = BTreeMap::new();
        if page.include_static_query {
            for (key, value) in &source.query_params {
                query.insert(key, value);
            }
        }
        for (key, value) in &page.query {
            query.insert(key, value);
        }
        if !query.is_empty() {
            request = request.query(&query);
        }

        if let Some(body) = &page.json_body {
            request = request.json(body);
        } else if method != HttpMethod::Get {
            if let Some(body) = &source.body {
                request = request.json(body);
            }
        }

        request = request.timeout(source.timeout());

        self.auth.apply(request, source)
    }

    pub async fn send(
        &self,
        source: &Source,
        method: HttpMethod,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        let request = self.build(source, method, page)?;

        tracing::debug!("📡 {}: {:?} {}", source.id, method, page.url);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IngestError::Cancelled),
            response = Self::execute(request) => response,
        }
    }

    async fn execute(request: reqwest::RequestBuilder) -> Result<RawResponse> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("Request timed out: {}", e)
            } else {
                e.to_string()
            };
            IngestError::transport(None, message)
        })?;

        let status = response.status();
        let url = response.url().to_string();

        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_ascii_lowercase())
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::transport(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(IngestError::transport(
                Some(status.as_u16()),
                format!("{} returned {}: {}", url, status, preview),
            ));
        }

        Ok(RawResponse {
            status: status.as_u16(),
            url,
            headers,
            body,
        })
    }
}
