//! Session-scoped cache of the last captured context and its generated answer.
//!
//! Holds at most one snapshot and at most one answer tied to that snapshot.
//! Timestamps are injected by the caller so freshness rules are deterministic
//! under test. The cache is owned by a single connection's dispatcher, which
//! makes every operation a critical section by construction.

use crate::normalize::Answer;
use std::time::{Duration, Instant};

/// A snapshot older than this is rejected by `solve`.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(300);

/// Within this window after generation, `solve` reuses the cached answer.
pub const ANSWER_REUSE_WINDOW: Duration = Duration::from_secs(10);

/// One captured screen-text/audio-text pair. Immutable once recorded;
/// replaced wholesale by the next capture.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub screen_text: String,
    pub audio_text: String,
    pub captured_at: Instant,
}

/// An answer tied to the snapshot that was current when it was generated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub answer: Answer,
    pub generated_at: Instant,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// `store_answer` without a snapshot. Unreachable under dispatcher
    /// ordering; kept as a hard internal error rather than a silent no-op.
    #[error("cannot store an answer without a current snapshot")]
    NoSnapshot,
}

/// The session cache. `Default` is the empty state.
#[derive(Debug, Default)]
pub struct SessionCache {
    snapshot: Option<Snapshot>,
    entry: Option<CacheEntry>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing snapshot and drops any answer tied to the old
    /// one, so a stale answer can never be observed against a new snapshot.
    pub fn record_snapshot(
        &mut self,
        screen_text: String,
        audio_text: String,
        now: Instant,
    ) -> &Snapshot {
        self.entry = None;
        self.snapshot.insert(Snapshot {
            screen_text,
            audio_text,
            captured_at: now,
        })
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// True iff a snapshot exists and is no older than [`SNAPSHOT_TTL`].
    pub fn has_valid_snapshot(&self, now: Instant) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| now.duration_since(s.captured_at) <= SNAPSHOT_TTL)
    }

    /// Returns the cached answer iff it was generated within
    /// [`ANSWER_REUSE_WINDOW`] of `now`.
    pub fn get_reusable_answer(&self, now: Instant) -> Option<&Answer> {
        self.entry
            .as_ref()
            .filter(|e| now.duration_since(e.generated_at) <= ANSWER_REUSE_WINDOW)
            .map(|e| &e.answer)
    }

    /// Attaches `answer` to the current snapshot.
    pub fn store_answer(&mut self, answer: Answer, now: Instant) -> Result<&CacheEntry, CacheError> {
        if self.snapshot.is_none() {
            return Err(CacheError::NoSnapshot);
        }
        Ok(self.entry.insert(CacheEntry {
            answer,
            generated_at: now,
        }))
    }

    /// Discards snapshot and answer together.
    pub fn clear(&mut self) {
        self.snapshot = None;
        self.entry = None;
    }
}
