mod compute;
mod receive_loop;

use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use forge_core::config::WorkerConfig;
use forge_core::handshake::worker_handshake;

fn logical_core_count(override_count: u32) -> u32 {
    if override_count > 0 {
        return override_count;
    }
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = WorkerConfig::load()?;
    let cores = logical_core_count(config.core_count_override);

    let mut stream = TcpStream::connect((config.coordinator_address.as_str(), config.coordinator_port))?;
    tracing::info!(
        coordinator = %config.coordinator_address,
        port = config.coordinator_port,
        cores,
        "connecting"
    );

    let session = worker_handshake(&mut stream, cores)?;
    tracing::info!("handshake complete, awaiting tasks");

    let read_stream = stream.try_clone()?;
    let write_stream = Arc::new(Mutex::new(stream));

    receive_loop::run(read_stream, write_stream, Arc::new(session));
    Ok(())
}
