//! Cash-at-risk position sizing.

/// Whole shares affordable with `cash × cash_at_risk` at `last_price`.
///
/// Returns 0 for a non-positive or non-finite price, non-positive cash, or a
/// non-positive risk fraction.
pub fn position_size(cash: f64, last_price: f64, cash_at_risk: f64) -> u64 {
    if !last_price.is_finite() || last_price <= 0.0 {
        return 0;
    }
    if !cash.is_finite() || cash <= 0.0 || !cash_at_risk.is_finite() || cash_at_risk <= 0.0 {
        return 0;
    }
    let shares = (cash * cash_at_risk / last_price).floor();
    if shares >= u64::MAX as f64 { u64::MAX } else { shares as u64 }
}

/// Inputs and result of one sizing decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub cash: f64,
    pub last_price: f64,
    pub quantity: u64,
}

impl Sizing {
    pub fn new(cash: f64, last_price: f64, cash_at_risk: f64) -> Self {
        Self {
            cash,
            last_price,
            quantity: position_size(cash, last_price, cash_at_risk),
        }
    }

    /// An order is placed only when one share is affordable and the size is non-zero.
    pub fn is_tradeable(&self) -> bool {
        self.cash >= self.last_price && self.quantity >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn floors_to_whole_shares() {
        assert_eq!(position_size(10_000.0, 150.0, 0.5), 33);
        assert_eq!(position_size(100_000.0, 100.0, 0.5), 500);
    }

    #[test]
    fn zero_price_guard() {
        assert_eq!(position_size(10_000.0, 0.0, 0.5), 0);
        assert_eq!(position_size(10_000.0, -1.0, 0.5), 0);
        assert_eq!(position_size(10_000.0, f64::NAN, 0.5), 0);
        assert_eq!(position_size(10_000.0, f64::INFINITY, 0.5), 0);
    }

    #[test]
    fn no_cash_no_shares() {
        assert_eq!(position_size(0.0, 10.0, 0.5), 0);
        assert_eq!(position_size(-50.0, 10.0, 0.5), 0);
        assert_eq!(position_size(1000.0, 10.0, 0.0), 0);
    }

    #[test]
    fn tradeable_needs_one_affordable_share() {
        assert!(Sizing::new(1000.0, 10.0, 0.5).is_tradeable());
        assert!(!Sizing::new(5.0, 10.0, 0.5).is_tradeable());
        // cash covers one share but half of it does not
        assert!(!Sizing::new(15.0, 10.0, 0.5).is_tradeable());
    }

    proptest! {
        #[test]
        fn never_exceeds_cash(
            cash in 0.0f64..1e9,
            price in 0.01f64..1e5,
            risk in 0.0f64..=1.0,
        ) {
            let qty = position_size(cash, price, risk);
            prop_assert!(qty as f64 * price <= cash + 1e-6);
        }

        #[test]
        fn larger_risk_never_buys_less(
            cash in 1.0f64..1e7,
            price in 0.01f64..1e4,
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(position_size(cash, price, lo) <= position_size(cash, price, hi));
        }
    }
}
