//! Splits a candidate space into a lazy sequence of [`Task`]s.
//!
//! Mirrors the chunking arithmetic used by the prototype this system is
//! based on: `chunk_count` is clamped to at least 1, then reduced if the
//! resulting per-chunk size would exceed `max_chunk_size`; the final chunk
//! absorbs whatever remainder doesn't divide evenly.

use forge_core::task::{Action, Task};

/// Produces the task id, action, expected result, and per-chunk candidate
/// ranges for a `total_size`-candidate space split across `chunk_count`
/// chunks (adjusted per `max_chunk_size`), starting ids at `first_task_id`.
///
/// Candidates are represented as `"start-end"` range strings over
/// `[0, total_size)`, expanded later by [`forge_core::candidates`].
pub fn chunk_range(
    total_size: u64,
    chunk_count: usize,
    max_chunk_size: Option<u64>,
    action: Action,
    expected_result: String,
    first_task_id: u64,
) -> impl Iterator<Item = Task> {
    let chunk_count = effective_chunk_count(total_size, chunk_count, max_chunk_size);
    let base = if chunk_count == 0 { 0 } else { total_size / chunk_count as u64 };
    let remainder = if chunk_count == 0 { 0 } else { total_size % chunk_count as u64 };

    (0..chunk_count).filter_map(move |i| {
        let start = i as u64 * base;
        let mut end = start + base;
        if i + 1 == chunk_count {
            end += remainder;
        }
        if start >= end {
            return None;
        }
        Some(Task {
            id: first_task_id + i as u64,
            action,
            expected_result: expected_result.clone(),
            input_buffer: vec![format!("{start}-{end}")],
        })
    })
}

/// Clamps `chunk_count` to at least 1, then shrinks it so that no chunk
/// exceeds `max_chunk_size` candidates, if a cap was given.
fn effective_chunk_count(total_size: u64, chunk_count: usize, max_chunk_size: Option<u64>) -> usize {
    let mut chunk_count = chunk_count.max(1);
    if let Some(max_chunk_size) = max_chunk_size {
        if max_chunk_size > 0 && chunk_count as u64 > 0 && total_size / chunk_count as u64 > max_chunk_size {
            let reduced = total_size / max_chunk_size;
            chunk_count = reduced.max(1) as usize;
        }
    }
    chunk_count
}
