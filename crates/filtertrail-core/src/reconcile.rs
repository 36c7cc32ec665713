// ABOUTME: Row count reconciliation, combining several noisy visible-row estimates into one count.
// ABOUTME: Uses the smallest estimate unless the estimates disagree widely, then the lower median.

/// Below this fraction of the largest estimate, the smallest one is considered an outlier.
pub const DISAGREEMENT_RATIO: f64 = 0.8;

/// The median fallback needs at least this many estimates to be meaningful.
pub const MIN_ESTIMATES_FOR_MEDIAN: usize = 3;

/// Reconcile one tick's estimates into a single count.
///
/// - no estimates: `previous` is carried forward
/// - at least [`MIN_ESTIMATES_FOR_MEDIAN`] estimates and `min < 0.8 * max`:
///   the lower median (element `(n - 1) / 2` of the sorted estimates)
/// - otherwise: the minimum
///
/// The result does not depend on the order of `estimates`. All-zero input
/// yields 0, never the previous value.
pub fn reconcile(estimates: &[u64], previous: u64) -> u64 {
    let (Some(&min_e), Some(&max_e)) = (estimates.iter().min(), estimates.iter().max()) else {
        return previous;
    };

    if estimates.len() >= MIN_ESTIMATES_FOR_MEDIAN && (min_e as f64) < DISAGREEMENT_RATIO * max_e as f64
    {
        let mut sorted = estimates.to_vec();
        sorted.sort_unstable();
        return sorted[(sorted.len() - 1) / 2];
    }

    min_e
}

/// Remembers the last reconciled count so empty ticks can carry it forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCountReconciler {
    last: u64,
}

impl RowCountReconciler {
    pub fn new(initial: u64) -> Self {
        Self { last: initial }
    }

    pub fn observe(&mut self, estimates: &[u64]) -> u64 {
        self.last = reconcile(estimates, self.last);
        self.last
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_disagreement_takes_minimum() {
        assert_eq!(reconcile(&[40, 42, 41], 0), 40);
    }

    #[test]
    fn high_disagreement_takes_median() {
        assert_eq!(reconcile(&[10, 50, 52], 0), 50);
        assert_eq!(reconcile(&[52, 10, 50], 0), 50);
    }

    #[test]
    fn even_count_uses_lower_median() {
        // sorted: 10, 40, 60, 70 -> lower median is 40
        assert_eq!(reconcile(&[70, 10, 60, 40], 0), 40);
    }

    #[test]
    fn two_estimates_never_use_median() {
        assert_eq!(reconcile(&[10, 100], 0), 10);
    }

    #[test]
    fn empty_carries_forward() {
        assert_eq!(reconcile(&[], 77), 77);
        let mut r = RowCountReconciler::new(12);
        assert_eq!(r.observe(&[]), 12);
        assert_eq!(r.observe(&[30, 31]), 30);
        assert_eq!(r.observe(&[]), 30);
    }

    #[test]
    fn all_zero_is_zero() {
        assert_eq!(reconcile(&[0, 0, 0], 500), 0);
        let mut r = RowCountReconciler::new(500);
        assert_eq!(r.observe(&[0]), 0);
    }

    #[test]
    fn single_estimate_is_returned() {
        assert_eq!(reconcile(&[9], 3), 9);
    }

    #[test]
    fn result_is_one_of_the_estimates() {
        let cases: [&[u64]; 5] = [&[1, 2, 3], &[5, 100, 6, 7], &[0, 10, 20], &[8], &[3, 3, 3, 3]];
        for estimates in cases {
            let got = reconcile(estimates, 999);
            assert!(estimates.contains(&got), "{got} not in {estimates:?}");
        }
    }
}
