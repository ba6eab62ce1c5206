//! Positional reassembly buffer for one directional byte stream.
//!
//! Capture events carry absolute stream positions and arrive in no
//! particular order, so the buffer is an ordered map of contiguous runs
//! keyed by start position rather than an append-only queue. A logical
//! read cursor (`head`) marks the next byte the consumer wants; the
//! buffer exposes the longest run available at exactly that position.
//!
//! Memory is bounded: total buffered bytes never exceed the configured
//! capacity. When an insertion would overflow, data is dropped rather
//! than grown. That is a lossy degradation, not an error.

use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Default per-stream capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 128 * 1024;

/// Reassembly buffer over one connection/direction byte stream.
///
/// Invariants:
/// - `head` only moves forward.
/// - Runs never overlap and are never adjacent (adjacent runs merge on
///   insertion), and all run positions are at or after `head`.
/// - A byte at a given position has a single value: the first fragment
///   to supply a byte wins; later overlapping fragments fill only the
///   positions still missing.
/// - The sum of run lengths never exceeds `capacity`.
pub struct StreamBuffer {
    /// Contiguous runs keyed by absolute start position.
    runs: BTreeMap<u64, Vec<u8>>,
    /// Capture timestamp of the fragment that first supplied each
    /// region, keyed by the region's start position.
    timestamps: BTreeMap<u64, u64>,
    /// Logical read cursor.
    head: u64,
    /// Total bytes currently buffered.
    buffered: usize,
    /// Maximum bytes this buffer may hold.
    capacity: usize,
}

impl StreamBuffer {
    /// Create a buffer bounded to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: BTreeMap::new(),
            timestamps: BTreeMap::new(),
            head: 0,
            buffered: 0,
            capacity,
        }
    }

    /// Logical read cursor position.
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Total bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Insert a fragment captured at absolute position `pos`.
    ///
    /// Data entirely behind the cursor is dropped (retransmitted or
    /// duplicated capture). A fragment straddling the cursor keeps only
    /// its at-or-after-cursor portion. Positions already buffered keep
    /// their original bytes.
    pub fn add(&mut self, pos: u64, data: &[u8], timestamp_ns: u64) {
        if data.is_empty() {
            return;
        }

        let end = pos + data.len() as u64;
        if end <= self.head {
            trace!(pos, len = data.len(), head = self.head, "fragment behind cursor, dropped");
            return;
        }

        // Clip the portion behind the cursor.
        let (pos, data) = if pos < self.head {
            let clip = (self.head - pos) as usize;
            trace!(pos, clip, "fragment straddles cursor, clipping front");
            (self.head, &data[clip..])
        } else {
            (pos, data)
        };

        // Compute the sub-ranges of [pos, end) not already buffered.
        let segments = self.uncovered_segments(pos, end);
        if segments.is_empty() {
            return;
        }

        for &(seg_start, seg_end) in &segments {
            let rel = (seg_start - pos) as usize..(seg_end - pos) as usize;
            self.timestamps.entry(seg_start).or_insert(timestamp_ns);
            self.insert_run(seg_start, data[rel].to_vec());
            self.buffered += (seg_end - seg_start) as usize;
        }

        self.enforce_capacity();
    }

    /// The longest run of bytes available starting exactly at the
    /// cursor; empty when the byte at the cursor is still missing.
    pub fn contiguous_prefix(&self) -> &[u8] {
        match self.runs.get(&self.head) {
            Some(run) => run,
            None => &[],
        }
    }

    /// Move the cursor forward over `n` consumed bytes.
    ///
    /// # Panics
    /// Panics if `n` exceeds the current contiguous prefix; consuming
    /// bytes that were never presented is a caller bug.
    pub fn advance(&mut self, n: usize) {
        let available = self.contiguous_prefix().len();
        assert!(
            n <= available,
            "advance({n}) beyond contiguous prefix ({available} bytes)"
        );
        if n == 0 {
            return;
        }

        let mut run = self.runs.remove(&self.head).unwrap();
        self.head += n as u64;
        self.buffered -= n;
        if n < run.len() {
            let tail = run.split_off(n);
            self.runs.insert(self.head, tail);
        }
        self.prune_timestamps();
    }

    /// Whether the byte at the cursor is missing while later data is
    /// buffered.
    pub fn has_gap_at_head(&self) -> bool {
        !self.runs.is_empty() && !self.runs.contains_key(&self.head)
    }

    /// Jump the cursor to the next buffered run, abandoning the
    /// unrecoverable gap region. Returns the number of bytes skipped.
    pub fn skip_gap(&mut self) -> u64 {
        match self.runs.keys().next().copied() {
            Some(next) if next > self.head => {
                let skipped = next - self.head;
                debug!(from = self.head, to = next, skipped, "skipping gap");
                self.head = next;
                self.prune_timestamps();
                skipped
            }
            _ => 0,
        }
    }

    /// Capture timestamp associated with the byte at the cursor, if any
    /// data at or before the cursor has been seen.
    pub fn timestamp_at_head(&self) -> Option<u64> {
        self.timestamps
            .range(..=self.head)
            .next_back()
            .map(|(_, &ts)| ts)
    }

    /// Sub-ranges of `[start, end)` not covered by existing runs, in
    /// ascending order.
    fn uncovered_segments(&self, start: u64, end: u64) -> Vec<(u64, u64)> {
        let mut covered: Vec<(u64, u64)> = Vec::new();

        // A run starting at or before `start` may extend into the range.
        if let Some((&run_start, run)) = self.runs.range(..=start).next_back() {
            let run_end = run_start + run.len() as u64;
            if run_end > start {
                covered.push((start, run_end.min(end)));
            }
        }
        // Runs starting inside the range.
        for (&run_start, run) in self.runs.range(start + 1..end) {
            let run_end = run_start + run.len() as u64;
            covered.push((run_start, run_end.min(end)));
        }

        let mut segments = Vec::new();
        let mut cursor = start;
        for (cov_start, cov_end) in covered {
            if cursor < cov_start {
                segments.push((cursor, cov_start));
            }
            cursor = cursor.max(cov_end);
        }
        if cursor < end {
            segments.push((cursor, end));
        }
        segments
    }

    /// Insert a run known not to overlap any existing run, merging with
    /// adjacent neighbors.
    fn insert_run(&mut self, start: u64, data: Vec<u8>) {
        let mut start = start;
        let mut run = data;

        if let Some((&prev_start, prev)) = self.runs.range(..start).next_back() {
            if prev_start + prev.len() as u64 == start {
                let mut merged = self.runs.remove(&prev_start).unwrap();
                merged.append(&mut run);
                run = merged;
                start = prev_start;
            }
        }

        let end = start + run.len() as u64;
        if let Some(next) = self.runs.remove(&end) {
            run.extend_from_slice(&next);
        }

        self.runs.insert(start, run);
    }

    /// Drop bytes until the buffer fits its capacity again.
    ///
    /// Order: the oldest bytes of the run at the cursor go first (the
    /// cursor is bumped past them, so it still only moves forward); when
    /// no data sits at the cursor, the pending run farthest ahead is
    /// trimmed from its tail, preserving data nearest the cursor.
    fn enforce_capacity(&mut self) {
        while self.buffered > self.capacity {
            let excess = self.buffered - self.capacity;

            if let Some(run) = self.runs.remove(&self.head) {
                let n = excess.min(run.len());
                debug!(evicted = n, head = self.head, "capacity eviction at cursor");
                self.head += n as u64;
                self.buffered -= n;
                if n < run.len() {
                    let mut run = run;
                    let tail = run.split_off(n);
                    self.runs.insert(self.head, tail);
                }
                self.prune_timestamps();
            } else {
                let (&last_start, last) = self.runs.iter_mut().next_back().unwrap();
                let n = excess.min(last.len());
                debug!(evicted = n, pos = last_start, "capacity eviction of distant fragment");
                let new_len = last.len() - n;
                self.buffered -= n;
                if new_len == 0 {
                    self.runs.remove(&last_start);
                } else {
                    last.truncate(new_len);
                }
            }
        }
    }

    /// Drop timestamp entries made unreachable by cursor movement,
    /// keeping the latest entry at or before the cursor.
    fn prune_timestamps(&mut self) {
        if let Some((&keep, _)) = self.timestamps.range(..=self.head).next_back() {
            let stale: Vec<u64> = self.timestamps.range(..keep).map(|(&k, _)| k).collect();
            for key in stale {
                self.timestamps.remove(&key);
            }
        }
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
