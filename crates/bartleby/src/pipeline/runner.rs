use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, info_span, warn, Instrument};

use crate::api::JobApi;
use crate::catalog::{CatalogSnapshot, CatalogStore};
use crate::error::{BartlebyError, Result, ValidationError};
use crate::upload::{validate_batch, BatchSummary, BlobStore, BlobUploader, SelectedFile};

use super::poller::{PollPolicy, StatusPoller};
use super::progress::{NoopProgress, PipelineStage, ProgressEvent, ProgressReporter};
use super::submit::JobSubmitter;
use super::view::ViewState;

/// Result of a run that reached completion.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub task_id: String,
    pub snapshot: Arc<CatalogSnapshot>,
}

#[derive(Default)]
struct PipelineState {
    selection: Vec<SelectedFile>,
    view: ViewState,
}

/// Select, validate, upload, submit, poll, refresh.
///
/// One run at a time: a second `process` while a run is active fails with
/// [`BartlebyError::Busy`].
pub struct UploadPipeline {
    uploader: BlobUploader,
    submitter: JobSubmitter,
    poller: StatusPoller,
    catalog: Arc<CatalogStore>,
    progress: Arc<dyn ProgressReporter>,
    state: Arc<Mutex<PipelineState>>,
    busy: Arc<AtomicBool>,
}

impl UploadPipeline {
    pub fn new(
        uploader: BlobUploader,
        submitter: JobSubmitter,
        poller: StatusPoller,
        catalog: Arc<CatalogStore>,
    ) -> Self {
        Self {
            uploader,
            submitter,
            poller,
            catalog,
            progress: Arc::new(NoopProgress),
            state: Arc::new(Mutex::new(PipelineState::default())),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wires the stages from their backends.
    pub fn from_parts(
        blob_store: Arc<dyn BlobStore>,
        jobs: Arc<dyn JobApi>,
        catalog: Arc<CatalogStore>,
        policy: PollPolicy,
    ) -> Self {
        Self::new(
            BlobUploader::new(blob_store),
            JobSubmitter::new(Arc::clone(&jobs)),
            StatusPoller::new(jobs, policy),
            catalog,
        )
    }

    /// Forwards every pipeline event to `progress` as well.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn view(&self) -> ViewState {
        let mut view = self.lock_state().view.clone();
        view.busy = self.is_busy();
        view
    }

    /// Validates and stores a new selection.
    ///
    /// A rejected batch leaves the previous selection in place and sets the error message.
    /// While a run is active the selection is locked and nothing changes.
    pub fn select_files(
        &self,
        files: Vec<SelectedFile>,
    ) -> std::result::Result<BatchSummary, ValidationError> {
        let mut state = self.lock_state();
        if self.is_busy() {
            debug!("Selection ignored while a run is active");
            return Err(ValidationError::RunInProgress);
        }
        match validate_batch(files) {
            Ok(batch) => {
                let summary = batch.summary();
                debug!(files = summary.total(), "Selection accepted");
                state.view = ViewState {
                    selected_files: batch.files().iter().map(|f| f.name.clone()).collect(),
                    summary: Some(summary),
                    status_message: Some(summary.to_string()),
                    ..ViewState::default()
                };
                state.selection = batch.into_files();
                Ok(summary)
            }
            Err(e) => {
                debug!(error = %e, "Selection rejected");
                state.view.error_message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// No-op while a run is active.
    pub fn clear_selection(&self) {
        let mut state = self.lock_state();
        if self.is_busy() {
            return;
        }
        state.selection.clear();
        state.view = ViewState::default();
    }

    /// Runs the whole pipeline for the current selection.
    ///
    /// Upload and submission failures keep the selection so the user can retry. A job
    /// that fails or cannot be tracked clears it.
    pub async fn process(&self, instruction: &str) -> Result<CompletedRun> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let files = self.lock_state().selection.clone();
        let reporter = ViewReporter {
            state: Arc::clone(&self.state),
            inner: Arc::clone(&self.progress),
        };
        if files.is_empty() {
            let err: BartlebyError = ValidationError::NoFilesSelected.into();
            return Err(fail(&reporter, PipelineStage::Validating, err));
        }
        self.lock_state().view.error_message = None;

        let span = info_span!("pipeline", files = files.len());
        self.run(files, instruction, reporter).instrument(span).await
    }

    async fn run(
        &self,
        files: Vec<SelectedFile>,
        instruction: &str,
        reporter: ViewReporter,
    ) -> Result<CompletedRun> {
        // Step 1: Upload every file
        reporter.report(ProgressEvent::Stage {
            stage: PipelineStage::Uploading,
            message: "Uploading files...".to_string(),
        });
        reporter.report(ProgressEvent::Upload { percent: 50 });
        let uploaded = match self
            .uploader
            .upload_all(&files)
            .instrument(info_span!("upload"))
            .await
        {
            Ok(uploaded) => uploaded,
            Err(e) => {
                reporter.report(ProgressEvent::Upload { percent: 0 });
                return Err(fail(&reporter, PipelineStage::Uploading, e.into()));
            }
        };
        reporter.report(ProgressEvent::Upload { percent: 100 });

        // Step 2: Create the processing job
        reporter.report(ProgressEvent::Stage {
            stage: PipelineStage::Submitting,
            message: "Submitting files for processing...".to_string(),
        });
        let task_id = match self
            .submitter
            .submit(&uploaded, instruction)
            .instrument(info_span!("submit"))
            .await
        {
            Ok(task_id) => task_id,
            Err(e) => return Err(fail(&reporter, PipelineStage::Submitting, e.into())),
        };

        // Step 3: Poll until the job settles
        reporter.report(ProgressEvent::Stage {
            stage: PipelineStage::Polling,
            message: "Processing files...".to_string(),
        });
        let mut guard = self
            .poller
            .spawn(task_id.clone(), Arc::new(reporter.clone()));
        let completed = match guard
            .wait()
            .instrument(info_span!("poll", task_id = %task_id))
            .await
        {
            Ok(completed) => completed,
            Err(e) => {
                {
                    let mut state = self.lock_state();
                    state.selection.clear();
                    state.view.selected_files.clear();
                    state.view.summary = None;
                }
                return Err(fail(&reporter, PipelineStage::Polling, e.into()));
            }
        };

        // Step 4: Reload the catalog and reset the form
        reporter.report(ProgressEvent::Stage {
            stage: PipelineStage::Refreshing,
            message: "Processing complete!".to_string(),
        });
        let snapshot = self.catalog.refresh().await;
        reporter.report(ProgressEvent::Completed {
            task_id: completed.task_id.clone(),
            inventory: snapshot.inventory.len(),
            documents: snapshot.documents.len(),
        });
        {
            let mut state = self.lock_state();
            state.selection.clear();
            state.view = ViewState::default();
        }
        info!(task_id = %completed.task_id, "Files processed successfully");

        Ok(CompletedRun {
            task_id: completed.task_id,
            snapshot,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<PipelineState>) -> MutexGuard<'_, PipelineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fail(reporter: &ViewReporter, stage: PipelineStage, err: BartlebyError) -> BartlebyError {
    warn!(%stage, error = %err, "Pipeline stopped");
    reporter.report(ProgressEvent::Failed {
        stage,
        error: err.user_message(),
    });
    err
}

/// Applies events to the view, then forwards them.
#[derive(Clone)]
struct ViewReporter {
    state: Arc<Mutex<PipelineState>>,
    inner: Arc<dyn ProgressReporter>,
}

impl ProgressReporter for ViewReporter {
    fn report(&self, event: ProgressEvent) {
        lock(&self.state).view.apply(&event);
        self.inner.report(event);
    }
}

/// Holds the in-progress flag for the duration of a run.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BartlebyError::Busy)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
