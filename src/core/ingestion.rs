use crate::core::client_factory::ClientFactory;
use crate::domain::model::Source;
use crate::domain::ports::{IngestionRunner, RecordSink};
use crate::domain::result::PaginatedFetchResult;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 一次來源執行：選客戶端 → 抓取全部頁面 → 交給下游
pub struct ClientIngestionRunner {
    factory: ClientFactory,
    sink: Arc<dyn RecordSink>,
}

impl ClientIngestionRunner {
    pub fn new(factory: ClientFactory, sink: Arc<dyn RecordSink>) -> Self {
        Self { factory, sink }
    }
}

#[async_trait]
impl IngestionRunner for ClientIngestionRunner {
    async fn run(&self, source: &Source, cancel: &CancellationToken) -> Result<PaginatedFetchResult> {
        let client = self.factory.client_for_source(source)?;

        let result = client
            .fetch_all_pages_with_cancel(source, source.pagination_type, &source.pagination, cancel)
            .await?;

        if result.success {
            self.sink.accept(source, &result).await?;
        }

        Ok(result)
    }
}
