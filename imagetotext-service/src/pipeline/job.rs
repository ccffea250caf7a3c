use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::export::DocumentArtifact;
use crate::ingestion::ImagePayload;

/// Identifies one pipeline job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable pipeline state names
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Validating,
    Extracting,
    Succeeded,
    EmptyResult,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::EmptyResult | PipelineState::Failed
        )
    }

    /// Whether a job in this state may move to `next`
    pub fn can_advance_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Extracting)
                | (Validating, Failed)
                | (Extracting, Succeeded)
                | (Extracting, EmptyResult)
                | (Extracting, Failed)
        )
    }
}

/// What a finished job produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExtractionResult {
    Text(String),
    Empty,
    Failure(String),
}

/// Job status; terminal variants carry their outcome
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Idle,
    Validating,
    Extracting,
    Succeeded {
        text: String,
        artifact: DocumentArtifact,
    },
    EmptyResult,
    Failed(PipelineError),
}

impl JobStatus {
    pub fn state(&self) -> PipelineState {
        match self {
            JobStatus::Idle => PipelineState::Idle,
            JobStatus::Validating => PipelineState::Validating,
            JobStatus::Extracting => PipelineState::Extracting,
            JobStatus::Succeeded { .. } => PipelineState::Succeeded,
            JobStatus::EmptyResult => PipelineState::EmptyResult,
            JobStatus::Failed(_) => PipelineState::Failed,
        }
    }
}

/// The single live job
#[derive(Debug, Clone)]
pub struct PipelineJob {
    id: JobId,
    payload: Option<Arc<ImagePayload>>,
    status: JobStatus,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PipelineJob {
    pub(crate) fn new(id: JobId, payload: Option<Arc<ImagePayload>>, status: JobStatus) -> Self {
        let now = Utc::now();
        Self {
            id,
            payload,
            status,
            started_at: now,
            updated_at: now,
        }
    }

    /// Initial job before any image has been selected
    pub fn idle() -> Self {
        Self::new(JobId::new(), None, JobStatus::Idle)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> Option<&Arc<ImagePayload>> {
        self.payload.as_ref()
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn state(&self) -> PipelineState {
        self.status.state()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// `None` until the job reaches a terminal state
    pub fn result(&self) -> Option<ExtractionResult> {
        match &self.status {
            JobStatus::Succeeded { text, .. } => Some(ExtractionResult::Text(text.clone())),
            JobStatus::EmptyResult => Some(ExtractionResult::Empty),
            JobStatus::Failed(e) => Some(ExtractionResult::Failure(e.to_string())),
            _ => None,
        }
    }

    pub fn artifact(&self) -> Option<&DocumentArtifact> {
        match &self.status {
            JobStatus::Succeeded { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    /// Move to `next` if the transition is allowed. Returns false (and leaves
    /// the job untouched) otherwise.
    pub(crate) fn advance(&mut self, next: JobStatus) -> bool {
        if !self.state().can_advance_to(next.state()) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}

/// Handle for a started job; consumed by exactly one extraction run
#[derive(Debug)]
pub struct JobTicket {
    pub job_id: JobId,
    pub payload: Option<Arc<ImagePayload>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use PipelineState::*;
        assert!(Idle.can_advance_to(Validating));
        assert!(Validating.can_advance_to(Extracting));
        assert!(Validating.can_advance_to(Failed));
        assert!(Extracting.can_advance_to(Succeeded));
        assert!(Extracting.can_advance_to(EmptyResult));
        assert!(Extracting.can_advance_to(Failed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        use PipelineState::*;
        for terminal in [Succeeded, EmptyResult, Failed] {
            assert!(terminal.is_terminal());
            for next in [Idle, Validating, Extracting, Succeeded, EmptyResult, Failed] {
                assert!(!terminal.can_advance_to(next), "{terminal} -> {next}");
            }
        }
        assert!(!Idle.can_advance_to(Extracting));
        assert!(!Validating.can_advance_to(Succeeded));
    }

    #[test]
    fn test_refused_transition_leaves_job_untouched() {
        let mut job = PipelineJob::idle();
        let updated_at = job.updated_at();

        assert!(!job.advance(JobStatus::EmptyResult));
        assert_eq!(job.state(), PipelineState::Idle);
        assert_eq!(job.updated_at(), updated_at);

        assert!(job.advance(JobStatus::Validating));
        assert!(job.advance(JobStatus::Failed(PipelineError::NoImage)));
        assert!(!job.advance(JobStatus::Extracting));
        assert_eq!(
            job.result(),
            Some(ExtractionResult::Failure("No image was supplied".to_string()))
        );
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PipelineState::EmptyResult.to_string(), "empty_result");
        assert_eq!(PipelineState::Succeeded.as_str(), "succeeded");
        assert_eq!(
            serde_json::to_value(PipelineState::EmptyResult).unwrap(),
            "empty_result"
        );
    }

    #[test]
    fn test_result_serialization() {
        assert_eq!(
            serde_json::to_value(ExtractionResult::Text("نص".to_string())).unwrap(),
            serde_json::json!({ "kind": "text", "value": "نص" })
        );
        assert_eq!(
            serde_json::to_value(ExtractionResult::Empty).unwrap(),
            serde_json::json!({ "kind": "empty" })
        );
    }
}
