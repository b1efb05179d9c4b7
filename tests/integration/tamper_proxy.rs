//! A transparent TCP proxy that sits between a worker and the coordinator
//! and flips one byte of a chosen frame's payload in the worker-to-
//! coordinator direction, to exercise the coordinator's AES-EAX tag check
//! (spec.md §8 scenario 6).
//!
//! Built directly on [`forge_core::frame`]'s length-prefixed read/write, the
//! same codec both real binaries speak, so the proxy tampers at exactly the
//! frame boundary the protocol defines rather than at an arbitrary byte
//! offset in the TCP stream.

use std::net::{TcpListener, TcpStream};
use std::thread;

use forge_core::frame::{read_frame, write_frame};

/// Starts the proxy on an ephemeral port, forwarding to `coordinator_port`
/// on localhost. The `tamper_frame_index`-th frame sent by the worker
/// (1-indexed) has its last payload byte flipped before being forwarded.
/// Returns the proxy's listening port.
pub fn spawn(coordinator_port: u16, tamper_frame_index: usize) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind tamper proxy");
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        let (worker_stream, _) = match listener.accept() {
            Ok(pair) => pair,
            Err(_) => return,
        };
        let coordinator_stream = match TcpStream::connect(("127.0.0.1", coordinator_port)) {
            Ok(s) => s,
            Err(_) => return,
        };

        let mut passthrough_read = coordinator_stream.try_clone().expect("clone failed");
        let mut passthrough_write = worker_stream.try_clone().expect("clone failed");
        thread::spawn(move || {
            let _ = std::io::copy(&mut passthrough_read, &mut passthrough_write);
        });

        forward_tampering(worker_stream, coordinator_stream, tamper_frame_index);
    });

    port
}

fn forward_tampering(mut from_worker: TcpStream, mut to_coordinator: TcpStream, tamper_frame_index: usize) {
    let mut frame_index = 0usize;
    loop {
        let mut payload = match read_frame(&mut from_worker) {
            Ok(p) => p,
            Err(_) => break,
        };
        frame_index += 1;

        if frame_index == tamper_frame_index {
            if let Some(last) = payload.last_mut() {
                *last ^= 0xFF;
            }
        }

        if write_frame(&mut to_coordinator, &payload).is_err() {
            break;
        }
    }
}
