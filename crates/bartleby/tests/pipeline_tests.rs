//! End-to-end runs of the upload pipeline against a mock backend.

mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use bartleby::pipeline::{PipelineStage, ProgressEvent, TimedProgressEvent};
use bartleby::{
    BartlebyError, BroadcastProgress, PollError, SubmissionError, UploadError, ValidationError,
};
use common::{declared_file, file, images, mixed_batch, TestHarness};

fn drain(receiver: &mut tokio::sync::broadcast::Receiver<TimedProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(timed) = receiver.try_recv() {
        events.push(timed.event);
    }
    events
}

#[tokio::test]
async fn test_batch_processed_end_to_end() {
    let harness = TestHarness::start().await;
    harness.mount_blob_storage().await;
    Mock::given(method("POST"))
        .and(path("/process-files"))
        .and(body_partial_json(json!({
            "fileTypes": {
                "images": [{"originalName": "teapot.jpg"}],
                "documents": [{"originalName": "appraisal.pdf"}]
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "success", "task_id": "t-1"})),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    harness
        .mount_status_once("t-1", json!({"status": "in_progress", "progress": 40}))
        .await;
    Mock::given(method("GET"))
        .and(path("/processing-status/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/inventory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Teapot", "category": "Kitchen"}
        ])))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "title": "Appraisal"
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let progress = Arc::new(BroadcastProgress::new(64));
    let mut events = progress.subscribe();
    let pipeline = harness.pipeline().with_progress(progress);

    let summary = pipeline.select_files(mixed_batch()).unwrap();
    assert_eq!(summary.to_string(), "Selected 1 image and 1 document");

    let run = pipeline.process("").await.unwrap();

    assert_eq!(run.task_id, "t-1");
    assert_eq!(run.snapshot.inventory.len(), 1);
    assert_eq!(run.snapshot.documents.len(), 1);
    assert_eq!(harness.catalog.generation(), 1);
    assert_eq!(harness.requests_to("/processing-status/t-1").await, 2);

    let events = drain(&mut events);
    assert!(events.contains(&ProgressEvent::Job {
        task_id: "t-1".to_string(),
        status: "in_progress".to_string(),
        percent: 40,
        message: None,
    }));
    let completions = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Completed { .. }))
        .count();
    assert_eq!(completions, 1);

    let view = pipeline.view();
    assert!(view.selected_files.is_empty());
    assert!(!view.busy);
    assert!(view.error_message.is_none());
}

#[tokio::test]
async fn test_uploads_use_bearer_token() {
    let harness = TestHarness::start().await;
    Mock::given(method("PUT"))
        .and(path("/blob/teapot.jpg"))
        .and(header("authorization", "Bearer test-blob-token"))
        .and(header("x-access", "public"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://store.test/teapot"})),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    harness.mount_submission("t-2").await;
    harness
        .mount_status_once("t-2", json!({"status": "completed"}))
        .await;
    harness.mount_listings(json!([]), json!([])).await;

    let pipeline = harness.pipeline();
    pipeline
        .select_files(vec![file("teapot.jpg", "image/jpeg", 32)])
        .unwrap();

    pipeline.process("Describe the item").await.unwrap();
}

#[tokio::test]
async fn test_failed_job_reports_error_and_skips_refresh() {
    let harness = TestHarness::start().await;
    harness.mount_blob_storage().await;
    harness.mount_submission("t-3").await;
    harness
        .mount_status_once("t-3", json!({"status": "failed", "message": "model unavailable"}))
        .await;
    harness.mount_listings(json!([]), json!([])).await;

    let pipeline = harness.pipeline();
    pipeline.select_files(images(2)).unwrap();

    let err = pipeline.process("").await.unwrap_err();

    assert!(matches!(err, BartlebyError::Poll(PollError::JobFailed { .. })));
    assert_eq!(err.user_message(), "An error occurred during processing.");
    assert_eq!(harness.requests_to("/api/inventory").await, 0);
    assert_eq!(harness.catalog.generation(), 0);

    let view = pipeline.view();
    assert_eq!(
        view.error_message.as_deref(),
        Some("An error occurred during processing.")
    );
    assert!(view.selected_files.is_empty());
    assert!(!view.busy);
}

#[tokio::test]
async fn test_too_many_files_never_touch_network() {
    let harness = TestHarness::start().await;
    let pipeline = harness.pipeline();

    let err = pipeline.select_files(images(21)).unwrap_err();

    assert!(matches!(err, ValidationError::TooManyFiles { count: 21, .. }));
    assert_eq!(err.to_string(), "Maximum 20 files allowed at once");
    assert_eq!(
        pipeline.view().error_message.as_deref(),
        Some("Maximum 20 files allowed at once")
    );

    let err = pipeline.process("").await.unwrap_err();
    assert!(matches!(
        err,
        BartlebyError::Validation(ValidationError::NoFilesSelected)
    ));
    assert_eq!(harness.total_requests().await, 0);
}

#[tokio::test]
async fn test_oversized_file_is_named() {
    let harness = TestHarness::start().await;
    let pipeline = harness.pipeline();

    let err = pipeline
        .select_files(vec![
            file("small.png", "image/png", 8),
            declared_file("scan.pdf", "application/pdf", 26 * 1024 * 1024),
        ])
        .unwrap_err();

    assert_eq!(err.to_string(), "Files exceeding 25MB: scan.pdf");
    assert_eq!(harness.total_requests().await, 0);
}

#[tokio::test]
async fn test_blob_rejection_keeps_selection() {
    let harness = TestHarness::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("token expired"))
        .mount(&harness.server)
        .await;

    let pipeline = harness.pipeline();
    pipeline.select_files(mixed_batch()).unwrap();

    let err = pipeline.process("").await.unwrap_err();

    assert!(matches!(
        err,
        BartlebyError::Upload(UploadError::Rejected { status: 403, .. })
    ));
    assert_eq!(harness.requests_to("/process-files").await, 0);
    let view = pipeline.view();
    assert_eq!(view.selected_files, vec!["teapot.jpg", "appraisal.pdf"]);
    assert_eq!(view.upload_progress, 0);
}

#[tokio::test]
async fn test_submission_error_message_from_backend() {
    let harness = TestHarness::start().await;
    harness.mount_blob_storage().await;
    Mock::given(method("POST"))
        .and(path("/process-files"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "Invalid file types"})),
        )
        .mount(&harness.server)
        .await;

    let progress = Arc::new(BroadcastProgress::new(64));
    let mut events = progress.subscribe();
    let pipeline = harness.pipeline().with_progress(progress);
    pipeline.select_files(images(1)).unwrap();

    let err = pipeline.process("").await.unwrap_err();

    assert!(matches!(
        err,
        BartlebyError::Submission(SubmissionError::Rejected(ref m)) if m == "Invalid file types"
    ));
    assert!(drain(&mut events).contains(&ProgressEvent::Failed {
        stage: PipelineStage::Submitting,
        error: "Invalid file types".to_string(),
    }));
    assert_eq!(pipeline.view().selected_files.len(), 1);
}
