use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ExtractionResult, JobId, JobStatus, PipelineJob, PipelineState};
use crate::i18n::I18n;

/// Downloadable artifact summary (the bytes are served separately)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub file_name: String,
    pub size_bytes: usize,
}

/// Client-facing view of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub state: PipelineState,
    pub result: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    /// Localized status line or error message
    pub notice: String,
    /// Stable failure code for `failed` jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn from_job(job: &PipelineJob, i18n: &I18n, locale: &str) -> Self {
        let notice = match job.status() {
            JobStatus::Idle => i18n.get(locale, "pipeline-idle", None),
            JobStatus::Validating => i18n.get(locale, "pipeline-validating", None),
            JobStatus::Extracting => i18n.get(locale, "pipeline-extracting", None),
            JobStatus::Succeeded { .. } => i18n.get(locale, "pipeline-succeeded", None),
            JobStatus::EmptyResult => i18n.get(locale, "pipeline-empty-result", None),
            JobStatus::Failed(e) => e.user_message(i18n, locale),
        };

        Self {
            job_id: job.id(),
            state: job.state(),
            result: job.result(),
            artifact: job.artifact().map(|artifact| ArtifactInfo {
                file_name: artifact.file_name().to_string(),
                size_bytes: artifact.size_bytes(),
            }),
            image_name: job.payload().map(|p| p.file_name().to_string()),
            notice,
            error_code: match job.status() {
                JobStatus::Failed(e) => Some(e.code()),
                _ => None,
            },
            started_at: job.started_at(),
            updated_at: job.updated_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::export::{DOCX_CONTENT_TYPE, DocumentArtifact, EXPORT_FILE_NAME};
    use bytes::Bytes;

    #[test]
    fn test_succeeded_snapshot_json() {
        let i18n = I18n::new();
        let mut job = PipelineJob::idle();
        assert!(job.advance(JobStatus::Validating));
        assert!(job.advance(JobStatus::Extracting));
        assert!(job.advance(JobStatus::Succeeded {
            text: "نص عربي".to_string(),
            artifact: DocumentArtifact::new(
                Bytes::from_static(b"PK\x03\x04"),
                EXPORT_FILE_NAME,
                DOCX_CONTENT_TYPE,
            ),
        }));

        let value = serde_json::to_value(JobSnapshot::from_job(&job, &i18n, "en")).unwrap();
        assert_eq!(value["state"], "succeeded");
        assert_eq!(value["result"]["kind"], "text");
        assert_eq!(value["result"]["value"], "نص عربي");
        assert_eq!(value["artifact"]["file_name"], "imagetotextpro-export.docx");
        assert_eq!(value["artifact"]["size_bytes"], 4);
        assert_eq!(value["job_id"], job.id().to_string());
    }

    #[test]
    fn test_failed_snapshot_hides_backend_detail() {
        let i18n = I18n::new();
        let mut job = PipelineJob::idle();
        assert!(job.advance(JobStatus::Validating));
        assert!(job.advance(JobStatus::Extracting));
        assert!(job.advance(JobStatus::Failed(PipelineError::ServiceFailure {
            message: "POST http://10.0.0.7:11434/api/chat: connection reset".to_string(),
        })));

        let snapshot = JobSnapshot::from_job(&job, &i18n, "en");
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("10.0.0.7"));
        assert_eq!(
            snapshot.notice,
            "Failed to extract text. Please try again with a clearer image."
        );
        assert!(snapshot.artifact.is_none());
        assert_eq!(snapshot.error_code, Some("service_failure"));
    }

    #[test]
    fn test_in_flight_snapshot_has_null_result() {
        let i18n = I18n::new();
        let mut job = PipelineJob::idle();
        assert!(job.advance(JobStatus::Validating));
        assert!(job.advance(JobStatus::Extracting));

        let snapshot = JobSnapshot::from_job(&job, &i18n, "ar");
        assert_eq!(snapshot.notice, "جارٍ استخراج النص...");

        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value["result"].is_null());
        assert!(value.get("artifact").is_none());
    }
}
