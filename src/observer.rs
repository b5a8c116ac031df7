use log::{debug, error, info};
use std::fmt;
use std::sync::Mutex;

/// Pipeline phase a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Read,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "Download",
            Stage::Read => "Chunk read",
            Stage::Transform => "Chunk processing",
            Stage::Load => "Database insert",
        };
        f.write_str(name)
    }
}

/// Progress and failure notifications emitted by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    DownloadStarted { url: String },
    DownloadFinished { url: String, bytes: u64 },
    ChunkStarted { index: usize },
    ChunkTransformed { index: usize, rows_in: usize, rows_out: usize },
    RowsInserted { index: usize, rows: usize, table: String },
    Completed { chunks: usize, rows_loaded: usize },
    Failed { stage: Stage, message: String },
}

pub trait PipelineObserver {
    fn on_event(&self, event: &PipelineEvent);
}

/// Renders events onto the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::DownloadStarted { url } => {
                info!("Downloading CSV file...");
                debug!("Source: {}", url);
            }
            PipelineEvent::DownloadFinished { bytes, .. } => {
                info!("Download complete.");
                debug!("Downloaded {} bytes", bytes);
            }
            PipelineEvent::ChunkStarted { index } => info!("Processing chunk {}", index),
            PipelineEvent::ChunkTransformed {
                index,
                rows_in,
                rows_out,
            } => debug!(
                "Chunk {} cleaned: {} rows in, {} rows out",
                index, rows_in, rows_out
            ),
            PipelineEvent::RowsInserted { rows, table, .. } => {
                info!("Inserted {} rows into {}.", rows, table)
            }
            PipelineEvent::Completed {
                chunks,
                rows_loaded,
            } => info!(
                "Pipeline finished: {} chunks, {} rows loaded",
                chunks, rows_loaded
            ),
            PipelineEvent::Failed { stage, message } => error!("{} failed: {}", stage, message),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of `Failed` events seen so far.
    pub fn failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Failed { .. }))
            .count()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
