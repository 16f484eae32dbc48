use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Stage of an upload-and-process run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validating,
    Uploading,
    Submitting,
    Polling,
    Refreshing,
    Completed,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Validating => write!(f, "Validating"),
            PipelineStage::Uploading => write!(f, "Uploading"),
            PipelineStage::Submitting => write!(f, "Submitting"),
            PipelineStage::Polling => write!(f, "Polling"),
            PipelineStage::Refreshing => write!(f, "Refreshing"),
            PipelineStage::Completed => write!(f, "Completed"),
            PipelineStage::Failed => write!(f, "Failed"),
        }
    }
}

/// Events emitted by the pipeline during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Stage {
        stage: PipelineStage,
        message: String,
    },
    Upload {
        percent: u8,
    },
    Job {
        task_id: String,
        status: String,
        percent: u8,
        message: Option<String>,
    },
    Completed {
        task_id: String,
        inventory: usize,
        documents: usize,
    },
    Failed {
        stage: PipelineStage,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Shared reporters report through the inner value.
impl<R: ProgressReporter + ?Sized> ProgressReporter for Arc<R> {
    fn report(&self, event: ProgressEvent) {
        (**self).report(event)
    }
}

/// A progress event with the time it was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedProgressEvent {
    #[serde(flatten)]
    pub event: ProgressEvent,
    pub timestamp: DateTime<Utc>,
}

/// Publishes pipeline events on a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<TimedProgressEvent>>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimedProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(TimedProgressEvent {
            event,
            timestamp: Utc::now(),
        });
    }
}
