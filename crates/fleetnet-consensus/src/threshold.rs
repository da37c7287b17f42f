//! Byzantine tolerance bound.
//!
//! Minimum-id flooding stays meaningful only while faulty nodes are a strict
//! minority that honest propagation can outvote: `3·f < n`.

use crate::error::{ConsensusError, Result};

/// Default share of nodes marked Byzantine by fault injection.
pub const DEFAULT_BYZANTINE_FRACTION: f64 = 0.3;

/// Largest number of Byzantine nodes tolerated among `total`.
///
/// Formula: the largest `f` with `3f < n`, i.e. `(n - 1) / 3`.
///
/// # Examples
///
/// ```
/// use fleetnet_consensus::max_byzantine;
///
/// assert_eq!(max_byzantine(0), 0);
/// assert_eq!(max_byzantine(4), 1);
/// assert_eq!(max_byzantine(10), 3);
/// ```
pub const fn max_byzantine(total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (total - 1) / 3
}

/// Check if `byzantine` faulty nodes among `total` is within tolerance.
pub const fn within_tolerance(byzantine: usize, total: usize) -> bool {
    byzantine * 3 < total || byzantine == 0
}

/// Fail fast if the Byzantine set breaks the tolerance bound.
pub fn check_tolerance(byzantine: usize, total: usize) -> Result<()> {
    if within_tolerance(byzantine, total) {
        Ok(())
    } else {
        Err(ConsensusError::InvalidByzantineFraction { byzantine, total })
    }
}

/// How many nodes a fraction marks Byzantine, capped at the tolerance bound.
///
/// `floor(total × fraction)`, never more than [`max_byzantine`].
pub fn byzantine_count(total: usize, fraction: f64) -> usize {
    let requested = (total as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
    requested.min(max_byzantine(total))
}
