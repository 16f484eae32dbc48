pub mod poller;
pub mod progress;
pub mod runner;
pub mod submit;
pub mod view;

pub use poller::{CompletedJob, PollGuard, PollPolicy, StatusPoller};
pub use progress::{
    BroadcastProgress, NoopProgress, PipelineStage, ProgressEvent, ProgressReporter,
    TimedProgressEvent,
};
pub use runner::{CompletedRun, UploadPipeline};
pub use submit::{build_request, JobSubmitter, DEFAULT_INSTRUCTION};
pub use view::ViewState;
