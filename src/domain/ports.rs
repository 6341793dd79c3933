use crate::domain::model::{PaginationType, ProtocolType, Source, SourceState};
use crate::domain::pagination::PaginationConfig;
use crate::domain::result::PaginatedFetchResult;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// 分頁客戶端：REST 與 GraphQL 各一個實作
#[async_trait]
pub trait PaginationClient: Send + Sync {
    fn protocol(&self) -> ProtocolType;

    async fn fetch_all_pages_with_cancel(
        &self,
        source: &Source,
        pagination_type: PaginationType,
        config: &PaginationConfig,
        cancel: &CancellationToken,
    ) -> Result<PaginatedFetchResult>;

    async fn fetch_all_pages(
        &self,
        source: &Source,
        pagination_type: PaginationType,
        config: &PaginationConfig,
    ) -> Result<PaginatedFetchResult> {
        let cancel = CancellationToken::new();
        self.fetch_all_pages_with_cancel(source, pagination_type, config, &cancel)
            .await
    }

    /// 只送一個輕量請求確認連線與認證
    async fn test_connection(&self, source: &Source) -> Result<bool>;
}

/// 送出前套用認證；憑證如何儲存與解密不在此引擎範圍內
pub trait AuthApplier: Send + Sync {
    fn apply(
        &self,
        request: reqwest::RequestBuilder,
        source: &Source,
    ) -> Result<reqwest::RequestBuilder>;
}

pub trait CronEvaluator: Send + Sync {
    /// 回傳嚴格晚於 `after` 的第一個觸發時間
    fn next_after(&self, expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>>;

    fn validate(&self, expression: &str) -> Result<()> {
        self.next_after(expression, Utc::now()).map(|_| ())
    }
}

/// 排程器寫回的欄位：只有排程／失敗追蹤狀態與 enabled
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUpdate {
    pub source_id: String,
    pub enabled: bool,
    pub state: SourceState,
}

impl SourceUpdate {
    pub fn from_source(source: &Source) -> Self {
        Self {
            source_id: source.id.clone(),
            enabled: source.enabled,
            state: source.state.clone(),
        }
    }
}

#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn load_sources(&self) -> Result<Vec<Source>>;
    async fn save_updates(&self, updates: &[SourceUpdate]) -> Result<()>;
}

/// 下游紀錄接收端（關聯式儲存、文件處理管線等）
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn accept(&self, source: &Source, result: &PaginatedFetchResult) -> Result<()>;
}

#[async_trait]
pub trait IngestionRunner: Send + Sync {
    async fn run(&self, source: &Source, cancel: &CancellationToken) -> Result<PaginatedFetchResult>;
}
