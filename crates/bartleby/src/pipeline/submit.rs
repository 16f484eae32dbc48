use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{JobApi, ProcessFilesRequest};
use crate::error::{ApiError, SubmissionError};
use crate::upload::UploadedFileRef;

/// Instruction sent when the user leaves the field blank.
pub const DEFAULT_INSTRUCTION: &str = "I am an AI assistant that helps catalog and analyze \
products and documents. For products, I will extract details, write SEO-optimized descriptions \
and suggest pricing. For documents, I will analyze content, identify key themes, extract \
metadata, and provide summaries.";

/// Shown when the backend rejects a submission without saying why.
pub const GENERIC_SUBMISSION_ERROR: &str =
    "An error occurred while processing the files. Please try again.";

const NON_SUCCESS_STATUS: &str = "An error occurred during file processing.";

/// Creates a processing job from a set of uploaded files.
#[derive(Clone)]
pub struct JobSubmitter {
    api: Arc<dyn JobApi>,
}

impl JobSubmitter {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        Self { api }
    }

    /// Posts one job-creation request and returns the backend task id.
    pub async fn submit(
        &self,
        files: &[UploadedFileRef],
        instruction: &str,
    ) -> Result<String, SubmissionError> {
        let request = build_request(files, instruction);
        info!(
            images = request.file_types.images.len(),
            documents = request.file_types.documents.len(),
            "Submitting processing job"
        );

        let response = self.api.submit_job(&request).await.map_err(|e| {
            warn!(error = %e, "Job submission failed");
            submission_error(e)
        })?;

        if !response.is_success() {
            let message = response
                .error
                .or(response.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| NON_SUCCESS_STATUS.to_string());
            warn!(status = %response.status, %message, "Backend rejected job");
            return Err(SubmissionError::Rejected(message));
        }

        match response.task_id.filter(|id| !id.trim().is_empty()) {
            Some(task_id) => {
                info!(%task_id, "Job accepted");
                Ok(task_id)
            }
            None => Err(SubmissionError::MissingTaskId),
        }
    }
}

/// Builds the request body, substituting the default instruction for a blank one.
pub fn build_request(files: &[UploadedFileRef], instruction: &str) -> ProcessFilesRequest {
    let instruction = if instruction.trim().is_empty() {
        DEFAULT_INSTRUCTION
    } else {
        instruction
    };
    ProcessFilesRequest::new(files, instruction)
}

fn submission_error(err: ApiError) -> SubmissionError {
    match err {
        ApiError::Transport { message, .. } => SubmissionError::Transport(message),
        ApiError::Status {
            message: Some(message),
            ..
        } => SubmissionError::Rejected(message),
        _ => SubmissionError::Rejected(GENERIC_SUBMISSION_ERROR.to_string()),
    }
}
