//! Volume and cost estimates from an average flow rate.
//!
//! Negative flow rates are accepted and produce negative volumes; callers
//! are expected to pass non-negative rates.

use serde::Serialize;

use crate::models::Granularity;

// ---

/// Water tariff in currency units per litre.
pub const PRICE_PER_LITER: f64 = 0.0023173;

/// Volume and cost over one period at a constant average flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    // ---
    pub granularity: Granularity,
    pub flow_rate: f64,
    pub volume_liters: f64,
    pub cost: f64,
}

impl Granularity {
    /// Multiplier from an average flow (L/min) to a period volume.
    pub fn volume_factor(self) -> f64 {
        // ---
        match self {
            Granularity::Daily => 86.4,
            Granularity::Weekly => 604.8,
            // 30.4167 days per month
            Granularity::Monthly => 2628.0,
        }
    }
}

pub fn calculate_volume(flow_rate: f64, granularity: Granularity) -> f64 {
    flow_rate * granularity.volume_factor()
}

pub fn calculate_cost(volume_liters: f64) -> f64 {
    volume_liters * PRICE_PER_LITER
}

/// Volume and cost for `flow_rate` sustained over one `granularity` period.
pub fn estimate(flow_rate: f64, granularity: Granularity) -> CostEstimate {
    // ---
    let volume_liters = calculate_volume(flow_rate, granularity);
    CostEstimate {
        granularity,
        flow_rate,
        volume_liters,
        cost: calculate_cost(volume_liters),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_volume_factors() {
        // ---
        assert!(close(calculate_volume(10.0, Granularity::Daily), 864.0));
        assert!(close(calculate_volume(10.0, Granularity::Weekly), 6048.0));
        assert!(close(calculate_volume(10.0, Granularity::Monthly), 26280.0));
    }

    #[test]
    fn test_cost_from_volume() {
        // ---
        let est = estimate(10.0, Granularity::Daily);
        assert!(close(est.cost, 864.0 * 0.0023173));
        assert_eq!(est.granularity, Granularity::Daily);
    }

    #[test]
    fn test_negative_flow_does_not_panic() {
        // ---
        let est = estimate(-1.0, Granularity::Weekly);
        assert!(est.volume_liters < 0.0);
        assert!(est.cost < 0.0);
    }
}
