//! Runs a dispatched task to completion on a pinned thread and reports the
//! result back over the shared connection.
//!
//! Pinning is advisory: the goal is simply that concurrent tasks don't
//! time-slice a single core when more are available, not strict isolation.

use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use forge_core::crypto::Session;
use forge_core::frame::send_encrypted_fields;
use forge_core::task::{Task, TaskOutcome};
use forge_core::wire::Field;
use forge_services::hash::search;

static CORES_USED: AtomicU64 = AtomicU64::new(0);

/// Spawns a detached thread that computes `task` and reports its outcome.
/// Returns immediately; the caller's receive loop keeps running.
pub fn spawn_task(task: Task, write_stream: Arc<Mutex<TcpStream>>, session: Arc<Session>) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    let pin_to = if core_ids.is_empty() {
        None
    } else {
        let n = core_ids.len() as u64;
        let index = CORES_USED.fetch_add(1, Ordering::SeqCst) % n;
        Some(core_ids[index as usize])
    };

    std::thread::spawn(move || {
        if let Some(core) = pin_to {
            core_affinity::set_for_current(core);
        }

        let outcome = search(&task);
        report(outcome, &write_stream, &session);
    });
}

fn report(outcome: TaskOutcome, write_stream: &Mutex<TcpStream>, session: &Session) {
    let fields = match &outcome {
        TaskOutcome::Found { task_id, preimage } => vec![
            Field::str("FOUND"),
            Field::str(task_id.to_string()),
            Field::str(preimage.clone()),
        ],
        TaskOutcome::Done { task_id } => vec![Field::str("DONE"), Field::str(task_id.to_string())],
    };

    let mut stream = write_stream.lock().unwrap();
    if let Err(e) = send_encrypted_fields(&mut *stream, session, &fields) {
        tracing::warn!(task_id = outcome.task_id(), error = %e, "failed to report task outcome");
    }
}
