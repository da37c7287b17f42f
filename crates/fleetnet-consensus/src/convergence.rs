//! Convergence tracking: has the network stopped changing its mind?
//!
//! Honest leader values only decrease over a finite id set, so every run
//! eventually stops changing. This records when it last changed.

/// Round-by-round record of leader changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergenceState {
    /// Latest round recorded.
    round: u64,
    /// Latest round in which any honest leader changed.
    last_change: Option<u64>,
    /// Leader changes summed over all rounds.
    total_changes: usize,
}

impl ConvergenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of `round`.
    pub fn record(&mut self, round: u64, leaders_changed: usize) {
        self.round = self.round.max(round);
        if leaders_changed > 0 {
            self.last_change = Some(round);
            self.total_changes += leaders_changed;
        }
    }

    /// Latest round recorded.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn last_change(&self) -> Option<u64> {
        self.last_change
    }

    pub fn total_changes(&self) -> usize {
        self.total_changes
    }

    /// Rounds since the last change (all of them if nothing ever changed).
    pub fn rounds_since_change(&self) -> u64 {
        match self.last_change {
            Some(at) => self.round - at,
            None => self.round,
        }
    }

    /// Check if no leader changed during the last `window` rounds.
    pub fn is_stable_for(&self, window: u64) -> bool {
        self.rounds_since_change() >= window
    }
}
