//! Reorder threshold policy.
//!
//! Pure evaluation over a stock snapshot; no IO. The same rule applies to
//! stores and regional warehouses: a location breaches when `available`
//! falls below `low_stock_ratio` of capacity, and replenishment aims at
//! `restock_ratio` of capacity. Locations with unknown capacity fall back to
//! flat threshold/target quantities.

use serde::Deserialize;

use crate::entities::replenishment_alert::Severity;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ThresholdPolicy {
    /// Breach boundary as a fraction of total stock (the "30% rule")
    pub low_stock_ratio: f64,
    /// Replenishment target as a fraction of total stock
    pub restock_ratio: f64,
    /// Fraction of the threshold below which the breach is urgent
    pub urgent_ratio: f64,
    /// Flat threshold used when total stock is unknown or zero
    pub fallback_threshold: i32,
    /// Flat replenishment target used when total stock is unknown or zero
    pub fallback_target: i32,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            low_stock_ratio: 0.3,
            restock_ratio: 0.9,
            urgent_ratio: 0.5,
            fallback_threshold: 50,
            fallback_target: 100,
        }
    }
}

/// Outcome of evaluating a stock snapshot against the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub breached: bool,
    /// Threshold quantity, rounded up for display
    pub threshold_qty: i32,
    /// Units needed to reach the replenishment target, never negative
    pub suggested_qty: i32,
    /// Units below the threshold, never negative
    pub shortage_qty: i32,
    pub severity: Severity,
}

impl ThresholdPolicy {
    pub fn evaluate(&self, total_stock: i32, available: i32) -> Evaluation {
        if total_stock > 0 {
            let threshold = f64::from(total_stock) * self.low_stock_ratio;
            let target = f64::from(total_stock) * self.restock_ratio;
            let breached = f64::from(available) < threshold;
            let severity = if f64::from(available) < threshold * self.urgent_ratio {
                Severity::Danger
            } else {
                Severity::Warning
            };

            Evaluation {
                breached,
                threshold_qty: threshold.ceil() as i32,
                suggested_qty: (target - f64::from(available)).ceil().max(0.0) as i32,
                shortage_qty: (threshold - f64::from(available)).ceil().max(0.0) as i32,
                severity,
            }
        } else {
            let breached = available < self.fallback_threshold;
            let severity =
                if f64::from(available) < f64::from(self.fallback_threshold) * self.urgent_ratio {
                    Severity::Danger
                } else {
                    Severity::Warning
                };

            Evaluation {
                breached,
                threshold_qty: self.fallback_threshold,
                suggested_qty: (self.fallback_target - available).max(0),
                shortage_qty: (self.fallback_threshold - available).max(0),
                severity,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn store_below_threshold_breaches() {
        let policy = ThresholdPolicy::default();

        // totalStock=200 -> threshold 60, target 180
        let eval = policy.evaluate(200, 45);
        assert!(eval.breached);
        assert_eq!(eval.threshold_qty, 60);
        assert_eq!(eval.suggested_qty, 135);
        assert_eq!(eval.shortage_qty, 15);
        assert_eq!(eval.severity, Severity::Warning);
    }

    #[test]
    fn warehouse_just_below_threshold_is_warning() {
        let policy = ThresholdPolicy::default();

        // totalStock=1000 -> threshold 300; 295 is breached but above 150
        let eval = policy.evaluate(1000, 295);
        assert!(eval.breached);
        assert_eq!(eval.suggested_qty, 605);
        assert_eq!(eval.severity, Severity::Warning);
    }

    #[test]
    fn deep_breach_is_urgent() {
        let policy = ThresholdPolicy::default();

        // 120 < 300 * 0.5
        let eval = policy.evaluate(1000, 120);
        assert!(eval.breached);
        assert_eq!(eval.severity, Severity::Danger);
        assert_eq!(eval.severity.label(), "Urgent");
    }

    #[test]
    fn at_threshold_is_not_a_breach() {
        let policy = ThresholdPolicy::default();

        let eval = policy.evaluate(200, 60);
        assert!(!eval.breached);

        let eval = policy.evaluate(1000, 300);
        assert!(!eval.breached);
    }

    #[test]
    fn above_target_suggests_nothing() {
        let policy = ThresholdPolicy::default();

        let eval = policy.evaluate(200, 190);
        assert!(!eval.breached);
        assert_eq!(eval.suggested_qty, 0);
        assert_eq!(eval.shortage_qty, 0);
    }

    #[test]
    fn unknown_capacity_uses_flat_fallback() {
        let policy = ThresholdPolicy::default();

        let eval = policy.evaluate(0, 20);
        assert!(eval.breached);
        assert_eq!(eval.threshold_qty, 50);
        assert_eq!(eval.suggested_qty, 80);
        assert_eq!(eval.shortage_qty, 30);
        assert_eq!(eval.severity, Severity::Danger);

        let eval = policy.evaluate(0, 60);
        assert!(!eval.breached);
    }

    proptest! {
        #[test]
        fn quantities_are_never_negative(total in 0i32..100_000, available in 0i32..100_000) {
            let eval = ThresholdPolicy::default().evaluate(total, available);
            prop_assert!(eval.suggested_qty >= 0);
            prop_assert!(eval.shortage_qty >= 0);
            prop_assert!(eval.threshold_qty >= 0);
        }

        #[test]
        fn urgent_implies_breached(total in 1i32..100_000, available in 0i32..100_000) {
            let eval = ThresholdPolicy::default().evaluate(total, available);
            if eval.severity == Severity::Danger {
                prop_assert!(eval.breached);
            }
        }

        #[test]
        fn breach_matches_shortage(total in 1i32..100_000, available in 0i32..100_000) {
            let eval = ThresholdPolicy::default().evaluate(total, available);
            prop_assert_eq!(eval.breached, eval.shortage_qty > 0);
        }
    }
}
