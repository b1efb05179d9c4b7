//! Per-connection bookkeeping: the accept loop, the handshake, and each
//! worker's receive loop. Writes to a worker's socket only ever happen
//! here or from [`crate::dispatch`]; both take the write half's lock
//! briefly, so sends stay serialized per connection as the concurrency
//! model requires.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use forge_core::crypto::Session;
use forge_core::frame::recv_encrypted_payload;
use forge_core::handshake::coordinator_handshake;
use forge_core::task::TaskOutcome;
use forge_core::wire::{decode_str, split_fields};
use forge_services::{TaskRegistry, WorkerId};

/// What the dispatch loop needs to send a task to a specific worker.
pub struct WorkerConn {
    pub write_stream: TcpStream,
    pub session: Arc<Session>,
}

pub type WorkerConns = Arc<Mutex<std::collections::HashMap<WorkerId, WorkerConn>>>;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

pub fn accept_loop(listener: TcpListener, registry: Arc<TaskRegistry>, conns: WorkerConns) {
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        let registry = registry.clone();
        let conns = conns.clone();
        std::thread::spawn(move || handle_connection(stream, registry, conns));
    }
}

fn handle_connection(mut stream: TcpStream, registry: Arc<TaskRegistry>, conns: WorkerConns) {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();

    let (session, cores) = match coordinator_handshake(&mut stream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(peer, error = %e, "handshake failed");
            return;
        }
    };
    let session = Arc::new(session);

    let id = NEXT_WORKER_ID.fetch_add(1, Ordering::SeqCst);
    let write_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(peer, error = %e, "failed to clone socket for writer");
            return;
        }
    };
    conns.lock().unwrap().insert(
        id,
        WorkerConn {
            write_stream,
            session: session.clone(),
        },
    );
    registry.register_worker(id, cores);
    tracing::info!(peer, worker_id = id, cores, "worker connected");

    loop {
        match recv_encrypted_payload(&mut stream, &session) {
            Ok(plaintext) => {
                if let Err(e) = handle_message(&registry, id, &plaintext) {
                    tracing::warn!(worker_id = id, error = %e, "malformed message, dropping connection");
                    break;
                }
            }
            Err(e) => {
                tracing::info!(worker_id = id, error = %e, "worker disconnected");
                break;
            }
        }
    }

    conns.lock().unwrap().remove(&id);
    registry.disconnect_worker(id);
}

fn handle_message(registry: &TaskRegistry, worker: WorkerId, plaintext: &[u8]) -> Result<(), forge_core::wire::WireError> {
    let first = split_fields(plaintext, 1)?;
    let tag = decode_str(first[0])?;
    match tag.as_str() {
        "DONE" => {
            let parts = split_fields(plaintext, 2)?;
            let task_id = decode_str(parts[1])?.parse::<u64>().map_err(|_| {
                forge_core::wire::WireError::FieldCountMismatch { expected: 2, found: 1 }
            })?;
            registry.complete_task(worker, TaskOutcome::Done { task_id });
            let stats = registry.stats();
            println!("{}/{} finished", stats.finished, stats.total_tasks);
            Ok(())
        }
        "FOUND" => {
            let parts = split_fields(plaintext, 3)?;
            let task_id = decode_str(parts[1])?.parse::<u64>().map_err(|_| {
                forge_core::wire::WireError::FieldCountMismatch { expected: 3, found: 2 }
            })?;
            let preimage = decode_str(parts[2])?;
            registry.complete_task(
                worker,
                TaskOutcome::Found {
                    task_id,
                    preimage: preimage.clone(),
                },
            );
            let elapsed = registry.stats().elapsed_secs;
            println!("FOUND: task {task_id} -> {preimage} ({elapsed:.2}s elapsed)");
            Ok(())
        }
        other => Err(forge_core::wire::WireError::UnknownMessageTag(other.to_string())),
    }
}
