use serde::Serialize;

use crate::upload::BatchSummary;

use super::progress::ProgressEvent;

/// What a front-end shows for the upload form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub selected_files: Vec<String>,
    pub summary: Option<BatchSummary>,
    /// 0 before upload, 50 while uploading, 100 once every file is stored.
    pub upload_progress: u8,
    pub processing_progress: u8,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    pub busy: bool,
    pub task_id: Option<String>,
}

impl ViewState {
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Stage { message, .. } => {
                self.status_message = Some(message.clone());
            }
            ProgressEvent::Upload { percent } => {
                self.upload_progress = *percent;
            }
            ProgressEvent::Job {
                task_id,
                percent,
                message,
                ..
            } => {
                self.task_id = Some(task_id.clone());
                self.processing_progress = *percent;
                if let Some(message) = message {
                    self.status_message = Some(message.clone());
                }
            }
            ProgressEvent::Completed { .. } => {
                self.processing_progress = 100;
            }
            ProgressEvent::Failed { error, .. } => {
                self.error_message = Some(error.clone());
            }
        }
    }

    /// Label above the progress bar while a run is active.
    pub fn progress_label(&self) -> &'static str {
        if self.upload_progress < 100 {
            "Uploading Files..."
        } else {
            "Processing Files..."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::progress::PipelineStage;

    #[test]
    fn test_job_event_keeps_previous_message_when_absent() {
        let mut view = ViewState::default();
        view.apply(&ProgressEvent::Stage {
            stage: PipelineStage::Polling,
            message: "Processing files...".to_string(),
        });
        view.apply(&ProgressEvent::Job {
            task_id: "t".to_string(),
            status: "in_progress".to_string(),
            percent: 40,
            message: None,
        });

        assert_eq!(view.processing_progress, 40);
        assert_eq!(view.status_message.as_deref(), Some("Processing files..."));
        assert_eq!(view.task_id.as_deref(), Some("t"));
    }

    #[test]
    fn test_progress_label() {
        let mut view = ViewState::default();
        assert_eq!(view.progress_label(), "Uploading Files...");
        view.apply(&ProgressEvent::Upload { percent: 100 });
        assert_eq!(view.progress_label(), "Processing Files...");
    }

    #[test]
    fn test_failure_sets_error() {
        let mut view = ViewState::default();
        view.apply(&ProgressEvent::Failed {
            stage: PipelineStage::Uploading,
            error: "Upload of 'a.png' failed: timeout".to_string(),
        });
        assert!(view.error_message.unwrap().contains("a.png"));
    }
}
