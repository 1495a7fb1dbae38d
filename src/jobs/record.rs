use std::time::Instant;

use serde::Serialize;

/// Lifecycle state of a tracked translation job.
///
/// A job is created `Pending` and moves to exactly one of the terminal
/// states when the completion notification arrives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Succeeded { asset_path: String },
    Failed { reason: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Terminal outcome carried by a completion notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded { asset_path: String },
    Failed { reason: String },
}

impl From<Outcome> for JobState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Succeeded { asset_path } => JobState::Succeeded { asset_path },
            Outcome::Failed { reason } => JobState::Failed { reason },
        }
    }
}

/// A tracked asynchronous translation request.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    /// Upstream subscription to tear down once the job is consumed. Filled in
    /// from the completion notification, which echoes the webhook that fired.
    pub webhook_id: Option<String>,
    pub created_at: Instant,
}

impl JobRecord {
    pub fn pending(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Pending,
            webhook_id: None,
            created_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_record_starts_without_webhook() {
        let record = JobRecord::pending("T1");
        assert_eq!(record.job_id, "T1");
        assert_eq!(record.state, JobState::Pending);
        assert!(record.webhook_id.is_none());
        assert!(!record.state.is_terminal());
    }

    #[test]
    fn outcome_converts_to_terminal_state() {
        let state: JobState = Outcome::Succeeded {
            asset_path: "documents/d/A/externaldata/X".to_string(),
        }
        .into();
        assert!(state.is_terminal());
        assert_eq!(state.as_str(), "succeeded");

        let state: JobState = Outcome::Failed {
            reason: "bad geometry".to_string(),
        }
        .into();
        assert_eq!(state.as_str(), "failed");
    }

    #[test]
    fn state_serializes_with_tag() {
        let state = JobState::Succeeded {
            asset_path: "documents/d/A/externaldata/X".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["asset_path"], "documents/d/A/externaldata/X");
    }
}
