mod connection;
mod dispatch;
mod status;

use std::io::BufRead;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use socket2::{Domain, Socket, Type};

use forge_core::config::CoordinatorConfig;
use forge_core::task::Action;
use forge_services::chunker::chunk_range;
use forge_services::TaskRegistry;

/// Builds the accept socket directly via `socket2` so the configured listen
/// backlog (spec.md §6: default 1000) is actually honored — `std`'s
/// `TcpListener::bind` hard-codes a small backlog with no way to override it.
fn bind_listener(bind_address: &str, port: u16, backlog: u32) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = format!("{bind_address}:{port}").parse().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid bind address: {e}"))
    })?;
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    socket.set_nonblocking(false)?;
    Ok(socket.into())
}

/// Total size of the default candidate space searched when no environment
/// override narrows it. Mirrors the scale of the workload this system was
/// built to crack: a dense decimal keyspace too large for one machine.
const DEFAULT_TOTAL_SIZE: u64 = 100_000_000;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = CoordinatorConfig::load()?;
    let listener = bind_listener(&config.bind_address, config.port, config.listen_backlog).map_err(|e| {
        tracing::error!(error = %e, "bind failed");
        e
    })?;
    println!(
        "coordinator listening on {}:{} (backlog {})",
        config.bind_address, config.port, config.listen_backlog
    );

    let registry = Arc::new(TaskRegistry::new());
    let conns: connection::WorkerConns = Arc::new(Mutex::new(std::collections::HashMap::new()));

    {
        let registry = registry.clone();
        let conns = conns.clone();
        std::thread::spawn(move || connection::accept_loop(listener, registry, conns));
    }

    let status_port = config.status_port;
    let status_registry = registry.clone();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("failed to start status endpoint runtime");
        runtime.block_on(async {
            if let Err(e) = status::serve(status_registry, status_port).await {
                tracing::error!(error = %e, "status endpoint exited");
            }
        });
    });

    println!("press Enter to begin dispatching against currently connected capacity...");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    let action = std::env::var("FORGE_ACTION")
        .ok()
        .and_then(|s| s.parse::<Action>().ok())
        .unwrap_or(Action::Md5);
    let expected_result = std::env::var("FORGE_TARGET_DIGEST")
        .unwrap_or_else(|_| "cfcd208495d565ef66e7dff9f98764da".to_string());
    let total_size: u64 = std::env::var("FORGE_TOTAL_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TOTAL_SIZE);

    let chunk_count = match registry.slot_count() {
        0 => config.chunk_count_hint,
        n => n,
    };
    let tasks = chunk_range(
        total_size,
        chunk_count,
        Some(config.max_chunk_size),
        action,
        expected_result,
        0,
    );
    registry.add_tasks(tasks);

    dispatch::run(registry, conns);
    Ok(())
}
