//! # Fault Diagnostics
//!
//! Bad handles never interrupt the frame. They are counted and kept in a
//! bounded history that the game loop (or a debug overlay on another thread)
//! inspects out of band, typically once per frame.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{HandleFault, Operation};

/// One recorded handle fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticEvent {
    /// Name of the registry that saw the fault.
    pub registry: &'static str,
    /// Operation being attempted.
    pub operation: Operation,
    /// What went wrong.
    pub fault: HandleFault,
}

/// Engine-wide sink for handle faults, shared by any number of registries.
///
/// The history buffer is allocated once; recording never allocates.
#[derive(Debug)]
pub struct Diagnostics {
    total: AtomicU64,
    history: usize,
    recent: Mutex<VecDeque<DiagnosticEvent>>,
}

impl Diagnostics {
    /// History length used by [`Diagnostics::default`].
    pub const DEFAULT_HISTORY: usize = 64;

    /// Creates a sink keeping the last `history` events (at least one).
    #[must_use]
    pub fn new(history: usize) -> Self {
        let history = history.max(1);
        Self {
            total: AtomicU64::new(0),
            history,
            recent: Mutex::new(VecDeque::with_capacity(history)),
        }
    }

    /// Creates a sink ready to be handed to several registries.
    #[must_use]
    pub fn shared(history: usize) -> Arc<Self> {
        Arc::new(Self::new(history))
    }

    /// Records a fault, evicting the oldest event when the history is full.
    pub fn record(&self, event: DiagnosticEvent) {
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut recent = self.recent.lock();
        if recent.len() == self.history {
            recent.pop_front();
        }
        recent.push_back(event);
    }

    /// Faults recorded since creation, across all registries.
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Maximum number of events kept.
    #[inline]
    #[must_use]
    pub const fn history_capacity(&self) -> usize {
        self.history
    }

    /// Copy of the retained events, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<DiagnosticEvent> {
        self.recent.lock().iter().copied().collect()
    }

    /// Takes the retained events, oldest first, leaving the history empty.
    #[must_use]
    pub fn drain_recent(&self) -> Vec<DiagnosticEvent> {
        self.recent.lock().drain(..).collect()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HISTORY)
    }
}
