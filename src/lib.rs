pub mod error;
pub mod extract;
pub mod fetch;
pub mod load;
pub mod observer;
pub mod pipeline;
pub mod structs;
pub mod transform;

// Re-export public API
pub use error::{ChunkProcessingError, DownloadError, LoadError, PipelineError, Result};
pub use extract::{ChunkReader, infer_schema};
pub use fetch::{Fetcher, HttpFetcher};
pub use load::{ChunkSink, SqliteLoader};
pub use observer::{LogObserver, PipelineEvent, PipelineObserver, RecordingObserver, Stage};
pub use pipeline::{process_artifact, run};
pub use structs::{FileLogger, PipelineConfig, RunSummary};
pub use transform::transform;
