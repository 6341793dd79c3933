pub mod auth;
pub mod file_store;
pub mod memory_store;
pub mod sink;

pub use auth::{CredentialAuth, NoAuth};
pub use file_store::FileSourceStore;
pub use memory_store::MemorySourceStore;
pub use sink::{JsonLinesSink, LogSink};
