pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::IngestConfig;

pub use adapters::{CredentialAuth, FileSourceStore, JsonLinesSink, LogSink, MemorySourceStore, NoAuth};
pub use core::client_factory::ClientFactory;
pub use core::cron::StandardCron;
pub use core::graphql_client::GraphQLPaginationClient;
pub use core::ingestion::ClientIngestionRunner;
pub use core::rate_limiter::RateLimiter;
pub use core::rest_client::RestPaginationClient;
pub use core::scheduler::{IngestionScheduler, RunOutcome, SchedulerConfig, TickSummary};
pub use domain::model::{HttpMethod, PaginationType, ProtocolType, Source, SourceState};
pub use domain::pagination::{PaginationConfig, SYSTEM_MAX_PAGES};
pub use domain::result::{FetchResult, PaginatedFetchResult};
pub use utils::error::{IngestError, Result};
