use metrics::counter;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::export::{DocumentArtifact, DocumentExporter, DocxExporter, NonEmptyText};
use crate::i18n::I18n;
use crate::ingestion::{ImageIngestion, RawFile};
use crate::ocr::{OcrService, OllamaOcr};
use crate::ollama::{ModelInfo, OllamaClient};
use crate::ingestion::ImagePayload;
use crate::pipeline::{JobSnapshot, JobTicket, PipelineController, PipelineJob, RunOutcome};

/// Main service coordinator
pub struct ImageToTextService {
    pub runtime_config: Arc<RuntimeConfig>,
    pub ollama: Arc<OllamaClient>,
    pub ocr: Arc<dyn OcrService>,
    pub ingestion: ImageIngestion,
    pub pipeline: Arc<PipelineController>,
    pub exporter: Arc<dyn DocumentExporter>,
    pub i18n: Arc<I18n>,
}

impl ImageToTextService {
    /// Create a new service instance backed by Ollama
    pub async fn new(runtime_config: Arc<RuntimeConfig>) -> ServiceResult<Self> {
        info!("Initializing ImageToText service");

        let dynamic = runtime_config.dynamic();
        let ollama = Arc::new(OllamaClient::new(dynamic.ollama.clone())?);

        if ollama.health_check().await {
            info!(url = %dynamic.ollama.base_url, model = %dynamic.ollama.ocr_model, "Ollama is available");
        } else {
            warn!(url = %dynamic.ollama.base_url, "Ollama is not available");
        }

        let ocr: Arc<dyn OcrService> = Arc::new(OllamaOcr::new(ollama.clone()));
        Self::assemble(runtime_config, ollama, ocr)
    }

    fn assemble(
        runtime_config: Arc<RuntimeConfig>,
        ollama: Arc<OllamaClient>,
        ocr: Arc<dyn OcrService>,
    ) -> ServiceResult<Self> {
        let dynamic = runtime_config.dynamic();

        let i18n = Arc::new(I18n::new());
        if !i18n.supports(&dynamic.ui.locale) {
            warn!(locale = %dynamic.ui.locale, "Unsupported UI locale, falling back to English");
        }

        let exporter: Arc<dyn DocumentExporter> = Arc::new(DocxExporter::new());
        let pipeline = Arc::new(PipelineController::new(ocr.clone(), exporter.clone()));
        let ingestion = ImageIngestion::new(&dynamic.limits);

        info!(
            backend = %ocr.name(),
            auto_extract = dynamic.pipeline.auto_extract,
            "Pipeline ready"
        );

        Ok(Self {
            runtime_config,
            ollama,
            ocr,
            ingestion,
            pipeline,
            exporter,
            i18n,
        })
    }

    /// Locale for user-facing messages
    pub fn locale(&self) -> &str {
        &self.runtime_config.dynamic().ui.locale
    }

    pub fn auto_extract(&self) -> bool {
        self.runtime_config.dynamic().pipeline.auto_extract
    }

    /// Validate an uploaded image and hand it to the pipeline.
    ///
    /// With `auto_extract` the job starts immediately and runs in the
    /// background; otherwise the image is staged for [`extract_staged`](Self::extract_staged).
    /// Validation failures never touch the current job.
    pub async fn submit_image(&self, raw: RawFile) -> ServiceResult<JobSnapshot> {
        let payload = self.ingest(raw).await?;

        if self.auto_extract() {
            let ticket = self.pipeline.begin(Some(payload));
            let snapshot = self.snapshot();
            self.spawn_run(ticket);
            Ok(snapshot)
        } else {
            self.pipeline.stage(payload);
            Ok(self.snapshot())
        }
    }

    /// Validate an image and extract it in-line, whatever the trigger mode.
    ///
    /// Resolves once the job is terminal. A newer upload replacing the job
    /// while it runs yields [`ServiceError::Superseded`].
    pub async fn extract_image(&self, raw: RawFile) -> ServiceResult<JobSnapshot> {
        let payload = self.ingest(raw).await?;

        match self.pipeline.submit(Some(payload)).await {
            RunOutcome::Completed(job) => Ok(self.snapshot_of(&job)),
            RunOutcome::Superseded { job_id } => Err(ServiceError::Superseded {
                job_id: job_id.to_string(),
            }),
            RunOutcome::Refused { job_id, from, to } => Err(ServiceError::InvalidRequest {
                message: format!("job {} cannot move from {} to {}", job_id, from, to),
            }),
        }
    }

    async fn ingest(&self, raw: RawFile) -> ServiceResult<ImagePayload> {
        let file_name = raw.file_name.clone();
        let payload = self.ingestion.ingest(raw).await.inspect_err(|e| {
            debug!(file = %file_name, error = %e, "Image rejected");
        })?;
        Ok(payload)
    }

    /// Manual "Extract" action on the staged image
    pub fn extract_staged(&self) -> JobSnapshot {
        let ticket = self.pipeline.begin_staged();
        let snapshot = self.snapshot();
        self.spawn_run(ticket);
        snapshot
    }

    fn spawn_run(&self, ticket: JobTicket) {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            match pipeline.run(ticket).await {
                RunOutcome::Completed(job) => {
                    debug!(job_id = %job.id(), state = %job.state(), "Background run finished");
                }
                RunOutcome::Superseded { job_id } => {
                    debug!(job_id = %job_id, "Background run superseded");
                }
                RunOutcome::Refused { job_id, from, to } => {
                    debug!(job_id = %job_id, from = %from, to = %to, "Background run refused");
                }
            }
        });
    }

    /// Build a document from (possibly edited) text, independent of the current job
    pub fn export_text(&self, text: impl Into<String>) -> ServiceResult<DocumentArtifact> {
        let text = NonEmptyText::new(text).ok_or(ServiceError::NoText)?;
        let artifact = self.exporter.export(&text)?;
        counter!("imagetotext_exports_total").increment(1);
        debug!(size = artifact.size_bytes(), "Edited text exported");
        Ok(artifact)
    }

    /// Artifact of the current job, if it succeeded
    pub fn current_artifact(&self) -> ServiceResult<DocumentArtifact> {
        self.pipeline
            .current()
            .artifact()
            .cloned()
            .ok_or(ServiceError::NoArtifact)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshot_of(&self.pipeline.current())
    }

    pub fn snapshot_of(&self, job: &PipelineJob) -> JobSnapshot {
        JobSnapshot::from_job(job, &self.i18n, self.locale())
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineJob> {
        self.pipeline.subscribe()
    }

    pub async fn ocr_available(&self) -> bool {
        self.ocr.is_available().await
    }

    pub async fn list_models(&self) -> ServiceResult<Vec<ModelInfo>> {
        self.ollama.list_models().await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{service, settled};
    use super::*;
    use crate::error::ValidationError;
    use crate::ingestion::data_uri;
    use crate::ingestion::fixtures::{JPEG_BYTES, PNG_BYTES};
    use crate::ocr::testing::{GatedOcr, ScriptedOcr};
    use crate::pipeline::{ExtractionResult, PipelineState};

    fn jpeg() -> RawFile {
        RawFile::from_bytes("scan.jpg", Some("image/jpeg".to_string()), JPEG_BYTES)
    }

    #[tokio::test]
    async fn test_auto_mode_extracts_and_exports() {
        let service = service(true, Arc::new(ScriptedOcr::replying("نص عربي")));

        let snapshot = service.submit_image(jpeg()).await.unwrap();
        assert_eq!(snapshot.state, PipelineState::Validating);

        let job = settled(&service).await;
        assert_eq!(job.id(), snapshot.job_id);
        assert_eq!(
            job.result(),
            Some(ExtractionResult::Text("نص عربي".to_string()))
        );

        let artifact = service.current_artifact().unwrap();
        assert_eq!(artifact.file_name(), "imagetotextpro-export.docx");
        assert!(artifact.bytes().starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_invalid_file_keeps_current_job() {
        let ocr = Arc::new(ScriptedOcr::default());
        let service = service(true, ocr.clone());
        let before = service.snapshot().job_id;

        let raw = RawFile::from_bytes("notes.txt", Some("text/plain".to_string()), "hi");
        let err = service.submit_image(raw).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::InvalidFileType { .. })
        ));
        assert_eq!(service.snapshot().job_id, before);
        assert_eq!(service.snapshot().state, PipelineState::Idle);
        assert!(ocr.calls().is_empty());
    }

    #[tokio::test]
    async fn test_manual_mode_stages_until_extract() {
        let ocr = Arc::new(ScriptedOcr::replying(""));
        let service = service(false, ocr.clone());

        let raw = RawFile::from_bytes("page.png", None, PNG_BYTES);
        let staged = service.submit_image(raw).await.unwrap();
        assert_eq!(staged.state, PipelineState::Idle);
        assert_eq!(staged.image_name.as_deref(), Some("page.png"));
        assert!(ocr.calls().is_empty());

        let started = service.extract_staged();
        assert_eq!(started.state, PipelineState::Validating);

        let job = settled(&service).await;
        assert_eq!(job.state(), PipelineState::EmptyResult);
        assert!(matches!(
            service.current_artifact(),
            Err(ServiceError::NoArtifact)
        ));
    }

    #[test]
    fn test_export_text_rejects_blank() {
        let service = service(true, Arc::new(ScriptedOcr::default()));
        assert!(matches!(
            service.export_text("   "),
            Err(ServiceError::NoText)
        ));

        let artifact = service.export_text("نص معدّل").unwrap();
        assert_eq!(artifact.file_name(), "imagetotextpro-export.docx");
        // Re-export does not touch the current job
        assert_eq!(service.snapshot().state, PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_extract_image_waits_for_terminal_state() {
        let ocr = Arc::new(ScriptedOcr::replying("نص فوري"));
        let service = service(false, ocr.clone());

        let snapshot = service.extract_image(jpeg()).await.unwrap();
        assert_eq!(snapshot.state, PipelineState::Succeeded);
        assert_eq!(
            snapshot.result,
            Some(ExtractionResult::Text("نص فوري".to_string()))
        );
        assert_eq!(service.snapshot().job_id, snapshot.job_id);
        assert_eq!(ocr.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_extract_image_replaced_by_newer_upload() {
        let (ocr, mut invoked) = GatedOcr::new();
        let ocr = Arc::new(ocr);
        let service = Arc::new(service(true, ocr.clone()));

        let release_first = ocr.gate(&data_uri::encode("image/jpeg", JPEG_BYTES));
        let release_second = ocr.gate(&data_uri::encode("image/png", PNG_BYTES));

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.extract_image(jpeg()).await }
        });
        invoked.recv().await.unwrap();

        let raw = RawFile::from_bytes("page.png", Some("image/png".to_string()), PNG_BYTES);
        let second = service.submit_image(raw).await.unwrap();
        invoked.recv().await.unwrap();

        release_first.send(Ok("نص قديم".to_string())).unwrap();
        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, ServiceError::Superseded { .. }));

        release_second.send(Ok("نص جديد".to_string())).unwrap();
        let job = settled(&service).await;
        assert_eq!(job.id(), second.job_id);
        assert_eq!(
            job.result(),
            Some(ExtractionResult::Text("نص جديد".to_string()))
        );
    }
}
