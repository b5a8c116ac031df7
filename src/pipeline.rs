use crate::error::{PipelineError, Result};
use crate::extract::{ChunkReader, infer_schema};
use crate::fetch::Fetcher;
use crate::load::ChunkSink;
use crate::observer::{PipelineEvent, PipelineObserver, Stage};
use crate::structs::{PipelineConfig, RunSummary};
use crate::transform::transform;
use log::debug;
use std::path::Path;

/// Runs the whole job: fetch once, then stream, clean and load every chunk.
///
/// Chunks are handled strictly one after another. The first failure is
/// reported once through `observer` and returned; chunks loaded before it
/// stay in the target table.
///
/// # Errors
///
/// Returns `PipelineError` if:
/// - the download fails (nothing is read or loaded)
/// - the artifact cannot be decoded
/// - a chunk fails to transform or load
pub fn run(
    config: &PipelineConfig,
    fetcher: &dyn Fetcher,
    sink: &mut dyn ChunkSink,
    observer: &dyn PipelineObserver,
) -> Result<RunSummary> {
    observer.on_event(&PipelineEvent::DownloadStarted {
        url: config.url.clone(),
    });
    let bytes = fetcher
        .download(&config.url, &config.local_path)
        .map_err(|e| report(observer, Stage::Download, e.into()))?;
    observer.on_event(&PipelineEvent::DownloadFinished {
        url: config.url.clone(),
        bytes,
    });

    process_artifact(&config.local_path, config.chunk_size, sink, observer)
}

/// Streams an already downloaded artifact through transform and load.
pub fn process_artifact(
    path: &Path,
    chunk_size: usize,
    sink: &mut dyn ChunkSink,
    observer: &dyn PipelineObserver,
) -> Result<RunSummary> {
    let read_error = |e| report(observer, Stage::Read, PipelineError::Read(e));
    let schema = infer_schema(path).map_err(read_error)?;
    let reader = ChunkReader::open(path, schema, chunk_size).map_err(read_error)?;

    let mut summary = RunSummary::default();
    for (index, chunk) in reader.enumerate() {
        let chunk = chunk.map_err(read_error)?;
        observer.on_event(&PipelineEvent::ChunkStarted { index });

        let cleaned = transform(&chunk).map_err(|source| {
            report(
                observer,
                Stage::Transform,
                PipelineError::ChunkProcessing {
                    chunk: index,
                    source,
                },
            )
        })?;
        observer.on_event(&PipelineEvent::ChunkTransformed {
            index,
            rows_in: chunk.num_rows(),
            rows_out: cleaned.num_rows(),
        });

        let rows = sink.load(&cleaned).map_err(|source| {
            report(
                observer,
                Stage::Load,
                PipelineError::Load {
                    chunk: index,
                    source,
                },
            )
        })?;
        observer.on_event(&PipelineEvent::RowsInserted {
            index,
            rows,
            table: sink.table().to_string(),
        });

        summary.chunks += 1;
        summary.rows_read += chunk.num_rows();
        summary.rows_loaded += rows;
    }

    debug!("Finished {} with {:?}", path.display(), summary);
    observer.on_event(&PipelineEvent::Completed {
        chunks: summary.chunks,
        rows_loaded: summary.rows_loaded,
    });
    Ok(summary)
}

fn report(observer: &dyn PipelineObserver, stage: Stage, error: PipelineError) -> PipelineError {
    observer.on_event(&PipelineEvent::Failed {
        stage,
        message: error.to_string(),
    });
    error
}
