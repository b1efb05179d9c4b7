//! The dispatch loop: pulls the next task the registry says is ready to go
//! out, and sends it to that task's chosen worker.

use std::sync::Arc;
use std::time::Instant;

use forge_core::frame::send_encrypted_fields;
use forge_core::wire::Field;
use forge_services::TaskRegistry;

use crate::connection::WorkerConns;

pub fn run(registry: Arc<TaskRegistry>, conns: WorkerConns) {
    let start = Instant::now();
    loop {
        let (worker, task) = match registry.dispatch_next() {
            Some(pair) => pair,
            None => break,
        };

        let sent = {
            let mut guard = conns.lock().unwrap();
            match guard.get_mut(&worker) {
                Some(conn) => send_encrypted_fields(
                    &mut conn.write_stream,
                    &conn.session,
                    &[Field::str("TASK"), Field::Bytes(task.to_json())],
                ),
                None => {
                    // Worker vanished between being selected and being sent to;
                    // treat exactly like a disconnect discovered by the receive loop.
                    registry.disconnect_worker(worker);
                    continue;
                }
            }
        };

        if let Err(e) = sent {
            tracing::warn!(worker_id = worker, error = %e, "failed to send task, treating worker as disconnected");
            registry.disconnect_worker(worker);
        }
    }

    let stats = registry.stats();
    println!(
        "all {} tasks finished in {:.2}s ({:.0} hashes/sec)",
        stats.total_tasks,
        start.elapsed().as_secs_f64(),
        stats.hashes_per_sec
    );
    if let Some(outcome) = stats.found {
        if let forge_core::task::TaskOutcome::Found { task_id, preimage } = outcome {
            println!("FOUND: task {task_id} -> {preimage}");
        }
    }
}
