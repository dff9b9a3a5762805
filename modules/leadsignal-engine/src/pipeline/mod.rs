pub mod ingest;
pub mod sources;
pub mod stats;


pub use ingest::{CancelToken, IngestPipeline};
pub use sources::{JsonFeedCollector, SourceCollector};
pub use stats::{CollectStats, FailedRecord};
