//! The coordinator's single source of truth: which tasks are pending, which
//! are in flight on which worker, and which have finished. Guarded by one
//! mutex, as the wire protocol is intentionally synchronous and
//! single-threaded-per-connection — the registry is the only place
//! concurrent connection threads touch shared state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::Instant;

use forge_core::candidates::expanded_len;
use forge_core::task::{Task, TaskOutcome};

pub type WorkerId = u64;

struct Inner {
    pending: VecDeque<Task>,
    in_flight: HashMap<WorkerId, Vec<Task>>,
    finished: Vec<(WorkerId, TaskOutcome)>,
    slots: Vec<WorkerId>,
    cursor: usize,
    total_tasks: u64,
    total_hashes_done: u64,
    found: Option<TaskOutcome>,
    start_time: Instant,
}

/// A snapshot of registry state, cheap to clone and safe to expose over the
/// status endpoint.
#[derive(Debug, Clone)]
pub struct Stats {
    pub total_tasks: u64,
    pub finished: u64,
    pub pending: u64,
    pub in_flight: u64,
    pub connected_workers: usize,
    pub elapsed_secs: f64,
    pub hashes_per_sec: f64,
    pub found: Option<TaskOutcome>,
}

pub struct TaskRegistry {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                in_flight: HashMap::new(),
                finished: Vec::new(),
                slots: Vec::new(),
                cursor: 0,
                total_tasks: 0,
                total_hashes_done: 0,
                found: None,
                start_time: Instant::now(),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Queues newly generated tasks, e.g. from [`crate::chunker`].
    pub fn add_tasks(&self, tasks: impl Iterator<Item = Task>) {
        let mut inner = self.inner.lock().unwrap();
        for task in tasks {
            inner.total_tasks += 1;
            inner.pending.push_back(task);
        }
        self.condvar.notify_all();
    }

    /// Registers a newly connected worker with `cores` capacity slots.
    pub fn register_worker(&self, worker: WorkerId, cores: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.in_flight.entry(worker).or_default();
        for _ in 0..cores {
            inner.slots.push(worker);
        }
        tracing::debug!(worker, cores, total_slots = inner.slots.len(), "slots granted");
        self.condvar.notify_all();
    }

    /// Removes a disconnected worker's slots and returns its in-flight
    /// tasks to the head of the pending queue, in their original order.
    pub fn disconnect_worker(&self, worker: WorkerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.slots.retain(|&w| w != worker);
        if let Some(mut reassigned) = inner.in_flight.remove(&worker) {
            let count = reassigned.len();
            for task in reassigned.drain(..).rev() {
                inner.pending.push_front(task);
            }
            tracing::debug!(worker, reassigned = count, "tasks returned to pending queue");
        }
        self.condvar.notify_all();
    }

    /// Blocks until a task can be dispatched to some connected worker, or
    /// every task has finished (returns `None`). The caller is expected to
    /// loop, calling this once per worker connection thread.
    pub fn dispatch_next(&self) -> Option<(WorkerId, Task)> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.finished.len() as u64 == inner.total_tasks && inner.total_tasks > 0 {
                return None;
            }
            if !inner.slots.is_empty() && !inner.pending.is_empty() {
                let idx = inner.cursor % inner.slots.len();
                let worker = inner.slots[idx];
                inner.cursor = inner.cursor.wrapping_add(1);
                let task = inner.pending.pop_front().unwrap();
                inner
                    .in_flight
                    .entry(worker)
                    .or_default()
                    .push(task.clone());
                return Some((worker, task));
            }
            inner = self.condvar.wait(inner).unwrap();
        }
    }

    /// Records a worker's terminal report for one task, moving it from
    /// in-flight to finished.
    pub fn complete_task(&self, worker: WorkerId, outcome: TaskOutcome) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tasks) = inner.in_flight.get_mut(&worker) {
            if let Some(pos) = tasks.iter().position(|t| t.id == outcome.task_id()) {
                let task = tasks.remove(pos);
                inner.total_hashes_done += expanded_len(&task.input_buffer);
            }
        }
        if matches!(outcome, TaskOutcome::Found { .. }) && inner.found.is_none() {
            inner.found = Some(outcome.clone());
        }
        inner.finished.push((worker, outcome));
        self.condvar.notify_all();
    }

    /// Number of capacity slots currently held by connected workers. Used
    /// to size the initial chunking pass so each slot gets roughly one
    /// chunk to start.
    pub fn slot_count(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }

    /// Every currently registered worker and the number of capacity slots
    /// it holds (its declared core count), for the read-only status API.
    pub fn workers(&self) -> Vec<(WorkerId, usize)> {
        let inner = self.inner.lock().unwrap();
        inner
            .in_flight
            .keys()
            .map(|&worker| {
                let cores = inner.slots.iter().filter(|&&w| w == worker).count();
                (worker, cores)
            })
            .collect()
    }

    pub fn is_done(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.total_tasks > 0 && inner.finished.len() as u64 == inner.total_tasks
    }

    pub fn stats(&self) -> Stats {
        let inner = self.inner.lock().unwrap();
        let elapsed = inner.start_time.elapsed().as_secs_f64();
        let in_flight_count: u64 = inner.in_flight.values().map(|v| v.len() as u64).sum();
        Stats {
            total_tasks: inner.total_tasks,
            finished: inner.finished.len() as u64,
            pending: inner.pending.len() as u64,
            in_flight: in_flight_count,
            connected_workers: inner.in_flight.len(),
            elapsed_secs: elapsed,
            hashes_per_sec: if elapsed > 0.0 {
                inner.total_hashes_done as f64 / elapsed
            } else {
                0.0
            },
            found: inner.found.clone(),
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
