//! End-to-end tests against the real `coordinatord`/`workerd` binaries.
//!
//! These spawn the compiled binaries as child processes and drive them over
//! loopback TCP and the status HTTP endpoint, the same way an operator would:
//! start the coordinator, let workers dial in, press Enter to begin
//! dispatch, then poll `/status` until the run completes. No root or network
//! namespace is required — everything is plain loopback sockets.
//!
//! Tests that spawn daemons share one fixed port pair and are serialized via
//! `DAEMON_LOCK` to avoid colliding with each other.
//!
//! If the binaries haven't been built yet (`cargo build --bins` / `cargo
//! test` without a prior build in this workspace layout), each test prints a
//! note and skips rather than failing.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::Value;

mod tamper_proxy;

const COORD_PORT: u16 = 19_090;
const STATUS_PORT: u16 = 19_091;

static DAEMON_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn coordinatord_path() -> PathBuf {
    workspace_root().join("target/debug/coordinatord")
}

fn workerd_path() -> PathBuf {
    workspace_root().join("target/debug/workerd")
}

fn binaries_available() -> bool {
    coordinatord_path().exists() && workerd_path().exists()
}

fn cleanup_stray_daemons() {
    Command::new("pkill").args(["-9", "-f", "target/debug/coordinatord"]).output().ok();
    Command::new("pkill").args(["-9", "-f", "target/debug/workerd"]).output().ok();
    thread::sleep(Duration::from_millis(200));
}

/// Spawns `coordinatord` with its operator stdin piped so the test can press
/// Enter once the expected workers have dialed in.
fn spawn_coordinator(total_size: u64, max_chunk_size: u64, action: &str, target_digest: &str) -> Child {
    Command::new(coordinatord_path())
        .env("RUST_LOG", "warn")
        .env("FORGE_PORT", COORD_PORT.to_string())
        .env("FORGE_STATUS_PORT", STATUS_PORT.to_string())
        .env("FORGE_TOTAL_SIZE", total_size.to_string())
        .env("FORGE_MAX_CHUNK_SIZE", max_chunk_size.to_string())
        .env("FORGE_ACTION", action)
        .env("FORGE_TARGET_DIGEST", target_digest)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .expect("failed to spawn coordinatord")
}

fn spawn_worker(core_count: u32) -> Child {
    Command::new(workerd_path())
        .env("RUST_LOG", "warn")
        .env("FORGE_COORDINATOR_ADDRESS", "127.0.0.1")
        .env("FORGE_COORDINATOR_PORT", COORD_PORT.to_string())
        .env("FORGE_CORE_COUNT", core_count.to_string())
        .stdout(Stdio::null())
        .spawn()
        .expect("failed to spawn workerd")
}

/// Spawns a worker that connects through a local byte-tampering proxy
/// instead of straight to the coordinator.
fn spawn_worker_via(proxy_port: u16, core_count: u32) -> Child {
    Command::new(workerd_path())
        .env("RUST_LOG", "warn")
        .env("FORGE_COORDINATOR_ADDRESS", "127.0.0.1")
        .env("FORGE_COORDINATOR_PORT", proxy_port.to_string())
        .env("FORGE_CORE_COUNT", core_count.to_string())
        .stdout(Stdio::null())
        .spawn()
        .expect("failed to spawn workerd")
}

fn press_enter(coordinator: &mut Child) {
    if let Some(stdin) = coordinator.stdin.as_mut() {
        let _ = stdin.write_all(b"\n");
    }
}

fn status() -> Result<Value> {
    let url = format!("http://127.0.0.1:{STATUS_PORT}/status");
    let resp = reqwest::blocking::get(&url)?.json::<Value>()?;
    Ok(resp)
}

fn wait_until<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

fn wait_for_status_reachable(timeout: Duration) -> bool {
    wait_until(|| status().is_ok(), timeout)
}

fn wait_for_connected_workers(n: u64, timeout: Duration) -> bool {
    wait_until(
        || status().ok().and_then(|v| v["connected_workers"].as_u64()).map(|c| c == n).unwrap_or(false),
        timeout,
    )
}

fn wait_for_finished(n: u64, timeout: Duration) -> bool {
    wait_until(
        || status().ok().and_then(|v| v["finished"].as_u64()).map(|f| f == n).unwrap_or(false),
        timeout,
    )
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

const MD5_OF_ZERO: &str = "cfcd208495d565ef66e7dff9f98764da";
const MD5_OF_SEVEN: &str = "8f14e45fceea167a5a36dedd4bea2543";
const MD5_NO_MATCH: &str = "00000000000000000000000000000000";

/// Scenario 1 (spec.md §8): single worker, single task, the match sits at
/// the very start of the range.
#[test]
fn single_worker_single_task_hit() {
    if !binaries_available() {
        eprintln!("skipping: coordinatord/workerd not built, run `cargo build --bins` first");
        return;
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    cleanup_stray_daemons();

    let mut coordinator = spawn_coordinator(10, 10, "MD5", MD5_OF_ZERO);
    assert!(wait_for_status_reachable(Duration::from_secs(5)), "status endpoint never came up");

    let mut worker = spawn_worker(1);
    assert!(wait_for_connected_workers(1, Duration::from_secs(5)), "worker never registered");

    press_enter(&mut coordinator);
    assert!(wait_for_finished(1, Duration::from_secs(10)), "run never completed");

    let found = status().unwrap()["found"].clone();
    assert_eq!(found["preimage"].as_str(), Some("0"));

    kill(&mut worker);
    kill(&mut coordinator);
}

/// Scenario 2: exhausting the whole range with no match reports `DONE` and
/// the run still terminates via the finished/total accounting.
#[test]
fn single_worker_no_hit_still_terminates() {
    if !binaries_available() {
        eprintln!("skipping: coordinatord/workerd not built, run `cargo build --bins` first");
        return;
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    cleanup_stray_daemons();

    let mut coordinator = spawn_coordinator(10, 10, "MD5", MD5_NO_MATCH);
    assert!(wait_for_status_reachable(Duration::from_secs(5)), "status endpoint never came up");

    let mut worker = spawn_worker(1);
    assert!(wait_for_connected_workers(1, Duration::from_secs(5)), "worker never registered");

    press_enter(&mut coordinator);
    assert!(wait_for_finished(1, Duration::from_secs(10)), "run never completed");

    let stats = status().unwrap();
    assert_eq!(stats["found"], Value::Null);
    assert_eq!(stats["total_tasks"].as_u64(), Some(1));

    kill(&mut worker);
    kill(&mut coordinator);
}

/// Scenario 3: a 1-core and a 3-core worker both connect; the run still
/// completes with their combined capacity. The exact 2-vs-6 split that the
/// round-robin slot vector produces is covered precisely by
/// `forge_services::registry`'s unit tests against the in-memory registry;
/// this test is the black-box confirmation that heterogeneous capacity
/// dispatches correctly end to end over real sockets.
#[test]
fn heterogeneous_capacity_workers_complete_the_run() {
    if !binaries_available() {
        eprintln!("skipping: coordinatord/workerd not built, run `cargo build --bins` first");
        return;
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    cleanup_stray_daemons();

    // total_size=8, max_chunk_size=1 -> 8 single-candidate tasks.
    let mut coordinator = spawn_coordinator(8, 1, "MD5", MD5_NO_MATCH);
    assert!(wait_for_status_reachable(Duration::from_secs(5)), "status endpoint never came up");

    let mut w1 = spawn_worker(1);
    let mut w2 = spawn_worker(3);
    assert!(wait_for_connected_workers(2, Duration::from_secs(5)), "workers never registered");

    press_enter(&mut coordinator);
    assert!(wait_for_finished(8, Duration::from_secs(15)), "run never completed");

    kill(&mut w1);
    kill(&mut w2);
    kill(&mut coordinator);
}

/// Scenario 4: killing a worker mid-run returns its in-flight tasks to
/// pending; a replacement worker picks them up and the run still completes.
#[test]
fn disconnect_mid_run_reassigns_to_a_new_worker() {
    if !binaries_available() {
        eprintln!("skipping: coordinatord/workerd not built, run `cargo build --bins` first");
        return;
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    cleanup_stray_daemons();

    // total_size=4, max_chunk_size=1 -> 4 single-candidate tasks on one worker.
    let mut coordinator = spawn_coordinator(4, 1, "MD5", MD5_NO_MATCH);
    assert!(wait_for_status_reachable(Duration::from_secs(5)), "status endpoint never came up");

    let mut worker = spawn_worker(1);
    assert!(wait_for_connected_workers(1, Duration::from_secs(5)), "worker never registered");

    press_enter(&mut coordinator);
    assert!(wait_for_finished(1, Duration::from_secs(10)), "first task never acked");

    kill(&mut worker);
    assert!(wait_for_connected_workers(0, Duration::from_secs(5)), "coordinator never noticed the disconnect");

    let mut replacement = spawn_worker(1);
    assert!(wait_for_connected_workers(1, Duration::from_secs(5)), "replacement worker never registered");
    assert!(wait_for_finished(4, Duration::from_secs(10)), "remaining tasks were never reassigned");

    kill(&mut replacement);
    kill(&mut coordinator);
}

/// Scenario 5: a range-form input buffer is expanded and searched correctly
/// over the wire (not just in `forge_services::hash`'s unit tests).
#[test]
fn range_form_task_is_expanded_and_searched() {
    if !binaries_available() {
        eprintln!("skipping: coordinatord/workerd not built, run `cargo build --bins` first");
        return;
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    cleanup_stray_daemons();

    let mut coordinator = spawn_coordinator(8, 8, "MD5", MD5_OF_SEVEN);
    assert!(wait_for_status_reachable(Duration::from_secs(5)), "status endpoint never came up");

    let mut worker = spawn_worker(1);
    assert!(wait_for_connected_workers(1, Duration::from_secs(5)), "worker never registered");

    press_enter(&mut coordinator);
    assert!(wait_for_finished(1, Duration::from_secs(10)), "run never completed");

    let found = status().unwrap()["found"].clone();
    assert_eq!(found["preimage"].as_str(), Some("7"));

    kill(&mut worker);
    kill(&mut coordinator);
}

/// Scenario 6: tampering one ciphertext byte in a worker's report must be
/// rejected by the coordinator's frame codec (AES-EAX tag mismatch), which
/// drops the connection and reassigns the victim task to a healthy worker.
#[test]
fn tampered_frame_is_rejected_and_task_is_reassigned() {
    if !binaries_available() {
        eprintln!("skipping: coordinatord/workerd not built, run `cargo build --bins` first");
        return;
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    cleanup_stray_daemons();

    let mut coordinator = spawn_coordinator(10, 10, "MD5", MD5_NO_MATCH);
    assert!(wait_for_status_reachable(Duration::from_secs(5)), "status endpoint never came up");

    // Frame 1 from the worker is the plaintext HELLO, frame 2 is the
    // encrypted handshake OK; frame 3 is its first task report.
    let proxy_port = tamper_proxy::spawn(COORD_PORT, 3);

    let mut victim = spawn_worker_via(proxy_port, 1);
    assert!(wait_for_connected_workers(1, Duration::from_secs(5)), "victim worker never registered");

    press_enter(&mut coordinator);
    assert!(wait_for_connected_workers(0, Duration::from_secs(10)), "coordinator never dropped the tampered connection");

    let mut healthy = spawn_worker(1);
    assert!(wait_for_finished(1, Duration::from_secs(10)), "reassigned task was never completed");

    kill(&mut victim);
    kill(&mut healthy);
    kill(&mut coordinator);
}
