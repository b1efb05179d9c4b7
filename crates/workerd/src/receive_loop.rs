//! The worker's single receive thread: read one frame, dispatch `TASK`
//! messages to an independently executing compute thread, and keep
//! reading. Any other tag or malformed payload is logged and skipped; per
//! the protocol's error policy, a dropped task is simply redelivered once
//! the connection itself drops.

use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use forge_core::crypto::Session;
use forge_core::frame::recv_encrypted_payload;
use forge_core::task::Task;
use forge_core::wire::{decode_str, split_fields};

use crate::compute;

pub fn run(mut read_stream: TcpStream, write_stream: Arc<Mutex<TcpStream>>, session: Arc<Session>) {
    loop {
        let plaintext = match recv_encrypted_payload(&mut read_stream, &session) {
            Ok(p) => p,
            Err(e) => {
                tracing::info!(error = %e, "coordinator connection closed");
                break;
            }
        };

        if let Err(e) = handle_frame(&plaintext, &write_stream, &session) {
            tracing::warn!(error = %e, "dropping malformed message");
        }
    }
}

fn handle_frame(
    plaintext: &[u8],
    write_stream: &Arc<Mutex<TcpStream>>,
    session: &Arc<Session>,
) -> Result<(), forge_core::wire::WireError> {
    let first = split_fields(plaintext, 1)?;
    let tag = decode_str(first[0])?;
    match tag.as_str() {
        "TASK" => {
            let parts = split_fields(plaintext, 2)?;
            let task = Task::from_json(parts[1])
                .map_err(|_| forge_core::wire::WireError::UnknownMessageTag("TASK".into()))?;
            tracing::info!(task_id = task.id, "task received");
            compute::spawn_task(task, write_stream.clone(), session.clone());
            Ok(())
        }
        other => Err(forge_core::wire::WireError::UnknownMessageTag(other.to_string())),
    }
}
