//! Operator CLI: polls the coordinator's status endpoint and prints a
//! summary. Read-only — there is no write surface to control a running
//! coordinator, matching the wire protocol's "no persisted state, no
//! cancellation" design.

use serde::Deserialize;

const DEFAULT_STATUS_PORT: u16 = 8090;

fn print_usage() {
    eprintln!("usage: hash-ctl [--port PORT] [--host HOST] <status|workers>");
    eprintln!("examples:");
    eprintln!("  hash-ctl status");
    eprintln!("  hash-ctl workers");
    eprintln!("  hash-ctl --port 9090 status");
    eprintln!("  hash-ctl --host 10.0.0.5 status");
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    total_tasks: u64,
    finished: u64,
    pending: u64,
    in_flight: u64,
    connected_workers: usize,
    elapsed_secs: f64,
    hashes_per_sec: f64,
    found: Option<FoundResponse>,
}

#[derive(Debug, Deserialize)]
struct FoundResponse {
    task_id: u64,
    preimage: String,
}

#[derive(Debug, Deserialize)]
struct WorkerResponse {
    worker_id: u64,
    cores: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut host = "127.0.0.1".to_string();
    let mut port = DEFAULT_STATUS_PORT;
    let mut remaining = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                port = args
                    .get(i + 1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_STATUS_PORT);
                i += 2;
            }
            "--host" => {
                host = args.get(i + 1).cloned().unwrap_or(host);
                i += 2;
            }
            other => {
                remaining.push(other.to_string());
                i += 1;
            }
        }
    }

    match remaining.first().map(String::as_str) {
        Some("workers") => cmd_workers(&host, port).await,
        Some("status") | None => cmd_status(&host, port).await,
        Some(other) => {
            eprintln!("unrecognized command: {other:?}");
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn cmd_status(host: &str, port: u16) -> anyhow::Result<()> {
    let url = format!("http://{host}:{port}/status");
    let response: StatusResponse = reqwest::get(&url).await?.json().await?;

    println!(
        "{}/{} finished ({} pending, {} in flight, {} workers connected)",
        response.finished, response.total_tasks, response.pending, response.in_flight, response.connected_workers
    );
    println!(
        "{:.0} hashes/sec, {:.1}s elapsed",
        response.hashes_per_sec, response.elapsed_secs
    );
    if let Some(found) = response.found {
        println!("FOUND: task {} -> {}", found.task_id, found.preimage);
    }
    Ok(())
}

async fn cmd_workers(host: &str, port: u16) -> anyhow::Result<()> {
    let url = format!("http://{host}:{port}/workers");
    let workers: Vec<WorkerResponse> = reqwest::get(&url).await?.json().await?;

    if workers.is_empty() {
        println!("no workers connected");
        return Ok(());
    }
    for w in &workers {
        println!("worker {}: {} cores", w.worker_id, w.cores);
    }
    println!("{} workers, {} total slots", workers.len(), workers.iter().map(|w| w.cores).sum::<usize>());
    Ok(())
}
