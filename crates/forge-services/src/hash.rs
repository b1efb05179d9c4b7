//! The actual preimage search: hash every candidate in a task's input
//! buffer and compare against the expected digest.

use forge_core::candidates::expand;
use forge_core::task::{Action, Task, TaskOutcome};
use md5::Md5;
use sha2::{Digest, Sha256};

fn digest_hex(action: Action, candidate: &str) -> String {
    match action {
        Action::Md5 => hex::encode(Md5::digest(candidate.as_bytes())),
        Action::Sha256 => hex::encode(Sha256::digest(candidate.as_bytes())),
    }
}

/// Searches `task.input_buffer` (expanded) for a candidate whose digest
/// matches `task.expected_result`, returning as soon as one is found.
pub fn search(task: &Task) -> TaskOutcome {
    for candidate in expand(&task.input_buffer) {
        if digest_hex(task.action, &candidate) == task.expected_result {
            return TaskOutcome::Found {
                task_id: task.id,
                preimage: candidate,
            };
        }
    }
    TaskOutcome::Done { task_id: task.id }
}
