//! Platform fee split.
//!
//! One rate, applied to every payment: the platform keeps
//! `total * rate_pct / 100` (integer division, remainder to the creator)
//! and the creator gets the rest. The two halves always reconstruct the
//! total exactly.

use serde::{Deserialize, Serialize};

use sienna_types::{Amount, DEFAULT_FEE_RATE_PCT};

use crate::{LedgerError, Result};

/// Fee configuration. Validated on construction so a split in hand is
/// always usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    rate_pct: u64,
}

impl FeeSplit {
    pub fn new(rate_pct: u64) -> Result<Self> {
        if rate_pct > 100 {
            return Err(LedgerError::Validation(format!(
                "fee rate {rate_pct}% exceeds 100%"
            )));
        }
        Ok(Self { rate_pct })
    }

    pub fn rate_pct(&self) -> u64 {
        self.rate_pct
    }

    /// Split a gross amount into `(platform_fee, creator_amount)`.
    pub fn split(&self, total: Amount) -> Result<(Amount, Amount)> {
        let fee = total
            .checked_mul(self.rate_pct)
            .ok_or(LedgerError::Overflow)?
            / 100;
        Ok((fee, total - fee))
    }
}

impl Default for FeeSplit {
    fn default() -> Self {
        Self {
            rate_pct: DEFAULT_FEE_RATE_PCT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate() {
        let split = FeeSplit::default();
        assert_eq!(split.rate_pct(), 10);
        assert_eq!(split.split(1_000).expect("split"), (100, 900));
    }

    #[test]
    fn test_halves_reconstruct_total() {
        let split = FeeSplit::new(10).expect("valid rate");
        // Amounts that do not divide evenly: the remainder goes to the
        // creator, never lost.
        for total in [0u64, 1, 7, 99, 101, 12_345, u64::MAX / 10] {
            let (fee, creator) = split.split(total).expect("split");
            assert_eq!(fee + creator, total, "total {total}");
            assert!(fee <= total / 10);
        }
    }

    #[test]
    fn test_boundary_rates() {
        assert_eq!(FeeSplit::new(0).expect("valid").split(500).expect("split"), (0, 500));
        assert_eq!(
            FeeSplit::new(100).expect("valid").split(500).expect("split"),
            (500, 0)
        );
        assert!(matches!(
            FeeSplit::new(101),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_overflow_detected() {
        let split = FeeSplit::new(10).expect("valid rate");
        assert!(matches!(split.split(u64::MAX), Err(LedgerError::Overflow)));
    }
}
