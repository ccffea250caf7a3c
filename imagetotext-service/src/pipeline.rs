//! Extraction pipeline controller.
//!
//! Exactly one job is live at a time. The live job sits in a `watch` channel:
//! starting a job replaces the channel value, and every later update for a job
//! is applied only if that job is still the one in the channel. A slow OCR
//! reply for a superseded job is therefore dropped instead of overwriting the
//! newer job. The same channel doubles as the update stream for clients.

mod job;
mod snapshot;

pub use job::{ExtractionResult, JobId, JobStatus, JobTicket, PipelineJob, PipelineState};
pub use snapshot::JobSnapshot;

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, format_error_chain};
use crate::export::{DocumentExporter, NonEmptyText};
use crate::ingestion::ImagePayload;
use crate::ocr::{OcrRequest, OcrService};

/// How a run ended from the caller's point of view
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The job reached a terminal state
    Completed(PipelineJob),
    /// A newer job replaced this one; its result was discarded
    Superseded { job_id: JobId },
    /// The job was not in a state that allows the requested transition
    Refused {
        job_id: JobId,
        from: PipelineState,
        to: PipelineState,
    },
}

enum Applied {
    Updated(PipelineJob),
    Stale,
    Refused {
        from: PipelineState,
        to: PipelineState,
    },
}

pub struct PipelineController {
    ocr: Arc<dyn OcrService>,
    exporter: Arc<dyn DocumentExporter>,
    current: watch::Sender<PipelineJob>,
}

impl PipelineController {
    pub fn new(ocr: Arc<dyn OcrService>, exporter: Arc<dyn DocumentExporter>) -> Self {
        let (current, _) = watch::channel(PipelineJob::idle());
        Self {
            ocr,
            exporter,
            current,
        }
    }

    /// Snapshot of the live job
    pub fn current(&self) -> PipelineJob {
        self.current.borrow().clone()
    }

    /// Receive every change to the live job
    pub fn subscribe(&self) -> watch::Receiver<PipelineJob> {
        self.current.subscribe()
    }

    pub fn is_current(&self, job_id: JobId) -> bool {
        self.current.borrow().id() == job_id
    }

    /// Replace the live job with an `Idle` one holding `payload`.
    ///
    /// Nothing is extracted until [`begin_staged`](Self::begin_staged).
    pub fn stage(&self, payload: ImagePayload) -> JobId {
        let job = PipelineJob::new(JobId::new(), Some(Arc::new(payload)), JobStatus::Idle);
        let job_id = job.id();
        let previous = self.current.send_replace(job);
        log_superseded(&previous, job_id);
        debug!(job_id = %job_id, "Image staged");
        job_id
    }

    /// Replace the live job with a fresh one in `Validating`.
    pub fn begin(&self, payload: Option<ImagePayload>) -> JobTicket {
        self.start(payload.map(Arc::new))
    }

    /// Start a fresh job from the payload of the live job (the staged image).
    pub fn begin_staged(&self) -> JobTicket {
        let job_id = JobId::new();
        let mut staged = None;
        let mut previous_state = PipelineState::Idle;
        let mut previous_id = job_id;

        // Read and replace under one lock so a concurrent stage can't slip between
        self.current.send_modify(|job| {
            staged = job.payload().cloned();
            previous_state = job.state();
            previous_id = job.id();
            *job = PipelineJob::new(job_id, staged.clone(), JobStatus::Validating);
        });

        if !previous_state.is_terminal() && previous_state != PipelineState::Idle {
            info!(superseded = %previous_id, job_id = %job_id, "Superseded in-flight job");
        }
        debug!(job_id = %job_id, has_image = staged.is_some(), "Staged job started");

        JobTicket {
            job_id,
            payload: staged,
        }
    }

    fn start(&self, payload: Option<Arc<ImagePayload>>) -> JobTicket {
        let job = PipelineJob::new(JobId::new(), payload.clone(), JobStatus::Validating);
        let job_id = job.id();
        let previous = self.current.send_replace(job);
        log_superseded(&previous, job_id);

        if let Some(payload) = &payload {
            debug!(
                job_id = %job_id,
                file = %payload.file_name(),
                hash = %payload.content_hash(),
                "Job started"
            );
        }

        JobTicket { job_id, payload }
    }

    /// `begin` + `run`
    pub async fn submit(&self, payload: Option<ImagePayload>) -> RunOutcome {
        let ticket = self.begin(payload);
        self.run(ticket).await
    }

    /// Drive a started job to its terminal state.
    ///
    /// The OCR service is called once. Its reply is applied only if the job is
    /// still live; on non-empty text the document is exported before the job
    /// is marked `Succeeded`.
    pub async fn run(&self, ticket: JobTicket) -> RunOutcome {
        let JobTicket { job_id, payload } = ticket;

        let Some(payload) = payload else {
            warn!(job_id = %job_id, "Extraction requested without an image");
            return self.finish(job_id, JobStatus::Failed(PipelineError::NoImage));
        };

        match self.apply(job_id, JobStatus::Extracting) {
            Applied::Updated(_) => {}
            Applied::Stale => return self.superseded(job_id),
            Applied::Refused { from, to } => return refused(job_id, from, to),
        }

        let started = Instant::now();
        let reply = self
            .ocr
            .extract(OcrRequest::new(payload.encoded_uri()))
            .await;
        histogram!("imagetotext_ocr_duration_seconds").record(started.elapsed().as_secs_f64());

        let status = match reply {
            Ok(response) => match NonEmptyText::new(response.extracted_text) {
                None => JobStatus::EmptyResult,
                Some(text) => {
                    if !self.is_current(job_id) {
                        return self.superseded(job_id);
                    }
                    self.export(job_id, text)
                }
            },
            Err(e) => {
                let message = format_error_chain(&e);
                warn!(job_id = %job_id, backend = %self.ocr.name(), error = %message, "Text extraction failed");
                JobStatus::Failed(PipelineError::ServiceFailure { message })
            }
        };

        self.finish(job_id, status)
    }

    fn export(&self, job_id: JobId, text: NonEmptyText) -> JobStatus {
        match self.exporter.export(&text) {
            Ok(artifact) => {
                counter!("imagetotext_exports_total").increment(1);
                debug!(job_id = %job_id, size = artifact.size_bytes(), "Document exported");
                JobStatus::Succeeded {
                    text: text.into_inner(),
                    artifact,
                }
            }
            Err(e) => {
                let message = format_error_chain(&e);
                warn!(job_id = %job_id, error = %message, "Document export failed");
                JobStatus::Failed(PipelineError::ExportFailure { message })
            }
        }
    }

    fn finish(&self, job_id: JobId, status: JobStatus) -> RunOutcome {
        let outcome = status.state();
        match self.apply(job_id, status) {
            Applied::Updated(job) => {
                counter!("imagetotext_jobs_total", "outcome" => outcome.as_str()).increment(1);
                info!(job_id = %job_id, state = %outcome, "Job finished");
                RunOutcome::Completed(job)
            }
            Applied::Stale => self.superseded(job_id),
            Applied::Refused { from, to } => refused(job_id, from, to),
        }
    }

    /// Apply `next` to the live job iff it is still `job_id`. The id check and
    /// the write happen under the channel lock.
    fn apply(&self, job_id: JobId, next: JobStatus) -> Applied {
        let mut applied = Applied::Stale;
        self.current.send_if_modified(|job| {
            if job.id() != job_id {
                return false;
            }
            let from = job.state();
            let to = next.state();
            if job.advance(next) {
                applied = Applied::Updated(job.clone());
                true
            } else {
                applied = Applied::Refused { from, to };
                false
            }
        });
        applied
    }

    fn superseded(&self, job_id: JobId) -> RunOutcome {
        counter!("imagetotext_stale_results_total").increment(1);
        debug!(job_id = %job_id, "Discarded result of superseded job");
        RunOutcome::Superseded { job_id }
    }
}

fn refused(job_id: JobId, from: PipelineState, to: PipelineState) -> RunOutcome {
    warn!(job_id = %job_id, from = %from, to = %to, "Refused pipeline transition");
    RunOutcome::Refused { job_id, from, to }
}

fn log_superseded(previous: &PipelineJob, job_id: JobId) {
    if matches!(
        previous.state(),
        PipelineState::Validating | PipelineState::Extracting
    ) {
        info!(superseded = %previous.id(), job_id = %job_id, "Superseded in-flight job");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::testing::RecordingExporter;
    use crate::ingestion::fixtures::{JPEG_BYTES, PNG_BYTES};
    use crate::ocr::testing::{GatedOcr, ScriptedOcr};
    use bytes::Bytes;

    fn jpeg(name: &str) -> ImagePayload {
        ImagePayload::new(name, "image/jpeg", Bytes::from_static(JPEG_BYTES))
    }

    fn png(name: &str) -> ImagePayload {
        ImagePayload::new(name, "image/png", Bytes::from_static(PNG_BYTES))
    }

    fn new_controller(
        ocr: Arc<dyn OcrService>,
    ) -> (PipelineController, Arc<RecordingExporter>) {
        let exporter = Arc::new(RecordingExporter::default());
        (PipelineController::new(ocr, exporter.clone()), exporter)
    }

    fn completed(outcome: RunOutcome) -> PipelineJob {
        match outcome {
            RunOutcome::Completed(job) => job,
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_starts_idle() {
        let (controller, _) = new_controller(Arc::new(ScriptedOcr::default()));
        let job = controller.current();
        assert_eq!(job.state(), PipelineState::Idle);
        assert!(job.payload().is_none());
        assert!(job.result().is_none());
    }

    #[tokio::test]
    async fn test_text_succeeds_and_exports_once() {
        let ocr = Arc::new(ScriptedOcr::replying("نص عربي"));
        let (controller, exporter) = new_controller(ocr.clone());

        let payload = jpeg("scan.jpg");
        let expected_uri = payload.encoded_uri().to_string();
        let job = completed(controller.submit(Some(payload)).await);

        assert_eq!(job.state(), PipelineState::Succeeded);
        assert_eq!(
            job.result(),
            Some(ExtractionResult::Text("نص عربي".to_string()))
        );
        assert!(job.artifact().is_some());
        assert_eq!(exporter.exported(), vec!["نص عربي".to_string()]);

        let calls = ocr.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].photo_data_uri, expected_uri);
    }

    #[tokio::test]
    async fn test_empty_text_is_empty_result() {
        let (controller, exporter) = new_controller(Arc::new(ScriptedOcr::replying("")));

        let job = completed(controller.submit(Some(png("blank.png"))).await);

        assert_eq!(job.state(), PipelineState::EmptyResult);
        assert_eq!(job.result(), Some(ExtractionResult::Empty));
        assert!(job.artifact().is_none());
        assert!(exporter.exported().is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_text_is_empty_result() {
        let (controller, exporter) = new_controller(Arc::new(ScriptedOcr::replying(" \n\t")));

        let job = completed(controller.submit(Some(png("blank.png"))).await);

        assert_eq!(job.state(), PipelineState::EmptyResult);
        assert!(exporter.exported().is_empty());
    }

    #[tokio::test]
    async fn test_service_error_fails_without_export() {
        let ocr = Arc::new(ScriptedOcr::failing("connection refused"));
        let (controller, exporter) = new_controller(ocr.clone());

        let job = completed(controller.submit(Some(jpeg("scan.jpg"))).await);

        assert_eq!(job.state(), PipelineState::Failed);
        match job.status() {
            JobStatus::Failed(PipelineError::ServiceFailure { message }) => {
                assert!(message.contains("connection refused"));
            }
            other => panic!("Expected ServiceFailure, got {:?}", other),
        }
        assert_eq!(
            job.result(),
            Some(ExtractionResult::Failure("Text extraction failed".to_string()))
        );
        assert!(exporter.exported().is_empty());
        // No retry
        assert_eq!(ocr.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_payload_fails_with_no_image() {
        let ocr = Arc::new(ScriptedOcr::replying("unused"));
        let (controller, _) = new_controller(ocr.clone());

        let job = completed(controller.submit(None).await);

        assert_eq!(job.status(), &JobStatus::Failed(PipelineError::NoImage));
        assert!(ocr.calls().is_empty());
    }

    #[tokio::test]
    async fn test_export_failure_fails_job() {
        let ocr: Arc<dyn OcrService> = Arc::new(ScriptedOcr::replying("نص"));
        let exporter = Arc::new(RecordingExporter::failing());
        let controller = PipelineController::new(ocr, exporter.clone());

        let job = completed(controller.submit(Some(jpeg("scan.jpg"))).await);

        assert!(matches!(
            job.status(),
            JobStatus::Failed(PipelineError::ExportFailure { .. })
        ));
        assert_eq!(exporter.exported().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_result_never_overwrites_newer_job() {
        let (ocr, mut invoked) = GatedOcr::new();
        let ocr = Arc::new(ocr);
        let exporter = Arc::new(RecordingExporter::default());
        let controller = Arc::new(PipelineController::new(ocr.clone(), exporter.clone()));

        let image_a = jpeg("a.jpg");
        let image_b = png("b.png");
        let release_a = ocr.gate(image_a.encoded_uri());
        let release_b = ocr.gate(image_b.encoded_uri());

        let ticket_a = controller.begin(Some(image_a));
        let job_a = ticket_a.job_id;
        let run_a = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run(ticket_a).await }
        });
        invoked.recv().await.unwrap();

        let ticket_b = controller.begin(Some(image_b));
        let job_b = ticket_b.job_id;
        let run_b = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run(ticket_b).await }
        });
        invoked.recv().await.unwrap();

        release_b.send(Ok("نص الصورة الثانية".to_string())).unwrap();
        let outcome_b = run_b.await.unwrap();
        assert_eq!(completed(outcome_b).id(), job_b);

        release_a.send(Ok("نص الصورة الأولى".to_string())).unwrap();
        let outcome_a = run_a.await.unwrap();
        assert!(matches!(outcome_a, RunOutcome::Superseded { job_id } if job_id == job_a));

        let current = controller.current();
        assert_eq!(current.id(), job_b);
        assert_eq!(current.state(), PipelineState::Succeeded);
        assert_eq!(
            current.result(),
            Some(ExtractionResult::Text("نص الصورة الثانية".to_string()))
        );
        assert_eq!(exporter.exported(), vec!["نص الصورة الثانية".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded() {
        let (ocr, mut invoked) = GatedOcr::new();
        let ocr = Arc::new(ocr);
        let (controller, _) = new_controller(ocr.clone());
        let controller = Arc::new(controller);

        let image_a = jpeg("a.jpg");
        let release_a = ocr.gate(image_a.encoded_uri());
        let ticket_a = controller.begin(Some(image_a));
        let run_a = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run(ticket_a).await }
        });
        invoked.recv().await.unwrap();

        let staged = controller.stage(png("b.png"));

        release_a.send(Err("timeout".to_string())).unwrap();
        assert!(matches!(
            run_a.await.unwrap(),
            RunOutcome::Superseded { .. }
        ));

        let current = controller.current();
        assert_eq!(current.id(), staged);
        assert_eq!(current.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_manual_extract_uses_staged_image() {
        let ocr = Arc::new(ScriptedOcr::replying("مرحبا"));
        let (controller, exporter) = new_controller(ocr.clone());

        let payload = jpeg("scan.jpg");
        let expected_uri = payload.encoded_uri().to_string();
        let staged = controller.stage(payload);
        assert_eq!(controller.current().state(), PipelineState::Idle);
        assert!(ocr.calls().is_empty());

        let ticket = controller.begin_staged();
        assert_ne!(ticket.job_id, staged);
        assert_eq!(controller.current().state(), PipelineState::Validating);

        let job = completed(controller.run(ticket).await);
        assert_eq!(job.state(), PipelineState::Succeeded);
        assert_eq!(ocr.calls()[0].photo_data_uri, expected_uri);
        assert_eq!(exporter.exported(), vec!["مرحبا".to_string()]);
    }

    #[tokio::test]
    async fn test_manual_extract_without_image_fails() {
        let (controller, _) = new_controller(Arc::new(ScriptedOcr::default()));

        let ticket = controller.begin_staged();
        let job = completed(controller.run(ticket).await);

        assert_eq!(job.status(), &JobStatus::Failed(PipelineError::NoImage));
    }

    #[tokio::test]
    async fn test_subscriber_sees_terminal_state() {
        let (controller, _) = new_controller(Arc::new(ScriptedOcr::replying("نص")));
        let mut updates = controller.subscribe();

        let ticket = controller.begin(Some(jpeg("scan.jpg")));
        assert_eq!(updates.borrow_and_update().state(), PipelineState::Validating);

        controller.run(ticket).await;

        assert!(updates.has_changed().unwrap());
        let job = updates.borrow_and_update().clone();
        assert_eq!(job.state(), PipelineState::Succeeded);
    }
}
