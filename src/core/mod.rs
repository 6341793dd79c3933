pub mod client_factory;
pub mod collector;
pub mod cron;
pub mod graphql_client;
pub mod http;
pub mod ingestion;
pub mod rate_limiter;
pub mod response;
pub mod rest_client;
pub mod scheduler;

pub use crate::domain::model::{PaginationType, ProtocolType, Source, SourceState};
pub use crate::domain::pagination::{PaginationConfig, SYSTEM_MAX_PAGES};
pub use crate::domain::ports::{
    AuthApplier, CronEvaluator, IngestionRunner, PaginationClient, RecordSink, SourceStore,
    SourceUpdate,
};
pub use crate::domain::result::{FetchResult, PaginatedFetchResult};
pub use crate::utils::error::Result;
