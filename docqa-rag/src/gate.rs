//! Relevance gate: decides whether retrieved context is close enough to use.
//!
//! Nearest-neighbour distance is the only signal available for suppressing
//! answers when no stored document is relevant, so the gate compares the best
//! distance against a fixed threshold. The threshold only makes sense for the
//! metric it was calibrated against; see
//! [`DEFAULT_RELEVANCE_THRESHOLD`](crate::config::DEFAULT_RELEVANCE_THRESHOLD).

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_RELEVANCE_THRESHOLD;

/// Returns `true` when the closest distance is at most `threshold`.
///
/// An empty list never passes. NaN distances are ignored, so a list made only
/// of NaNs does not pass either.
pub fn gate(distances: &[f32], threshold: f32) -> bool {
    distances
        .iter()
        .copied()
        .filter(|d| !d.is_nan())
        .reduce(f32::min)
        .is_some_and(|best| best <= threshold)
}

/// A [`gate`] bound to a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceGate {
    threshold: f32,
}

impl RelevanceGate {
    /// Create a gate with the given maximum distance.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// The maximum distance accepted.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether context with these distances may be used.
    pub fn passes(&self, distances: &[f32]) -> bool {
        gate(distances, self.threshold)
    }
}

impl Default for RelevanceGate {
    fn default() -> Self {
        Self::new(DEFAULT_RELEVANCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_never_passes() {
        assert!(!gate(&[], 1.5));
        assert!(!gate(&[], f32::INFINITY));
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(gate(&[1.5], 1.5));
        assert!(!gate(&[1.5001], 1.5));
    }

    #[test]
    fn only_the_best_distance_matters() {
        assert!(gate(&[3.0, 0.2, 9.0], 1.5));
        assert!(!RelevanceGate::default().passes(&[1.6, 2.0]));
    }

    #[test]
    fn nan_is_ignored() {
        assert!(!gate(&[f32::NAN], 1.5));
        assert!(gate(&[f32::NAN, 1.0], 1.5));
    }
}
