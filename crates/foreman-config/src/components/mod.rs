//! Configuration sections.

mod jobs;
mod logging;
mod storage;

pub use jobs::{JobsConfig, QueueConfig};
pub use logging::LoggingConfig;
pub use storage::{CacheConfig, DatabaseConfig};
