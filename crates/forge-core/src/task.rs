//! Wire schema for a single unit of dispatched work.
//!
//! Tasks travel as JSON (`serde_json`) rather than a language-specific
//! serialization format, so either side of the protocol can be reimplemented
//! independently.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Md5,
    Sha256,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Md5 => "MD5",
            Action::Sha256 => "SHA256",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = TaskCodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MD5" => Ok(Action::Md5),
            "SHA256" => Ok(Action::Sha256),
            other => Err(TaskCodecError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskCodecError {
    #[error("unknown hash action {0:?}")]
    UnknownAction(String),
    #[error("malformed task body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

/// One contiguous piece of the candidate-preimage space, assigned to a
/// single worker in a single dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub action: Action,
    pub expected_result: String,
    /// Either literal candidate strings, or half-open range endpoints of
    /// the form `"start-end"` to be expanded lazily by the worker (see
    /// [`crate::candidates`]).
    pub input_buffer: Vec<String>,
}

impl Task {
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Task serialization cannot fail")
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, TaskCodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The worker's terminal report for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// A matching preimage was found; carries the candidate that matched.
    Found { task_id: u64, preimage: String },
    /// The task's entire input space was exhausted with no match.
    Done { task_id: u64 },
}

impl TaskOutcome {
    pub fn task_id(&self) -> u64 {
        match self {
            TaskOutcome::Found { task_id, .. } => *task_id,
            TaskOutcome::Done { task_id } => *task_id,
        }
    }
}
