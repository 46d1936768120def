//! Platform fee policy
//!
//! Fees are expressed in basis points of the claimed amount and always
//! rounded down. The rate is capped at [`MAX_PLATFORM_FEE_BPS`] (10%).

use crate::error::{Error, Result};
use crate::types::Amount;
use serde::{Deserialize, Serialize};

/// Basis-point denominator
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Highest accepted platform fee (10%)
pub const MAX_PLATFORM_FEE_BPS: u32 = 1_000;

/// Default platform fee (0.25%)
pub const DEFAULT_PLATFORM_FEE_BPS: u32 = 25;

/// Process-wide fee configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Platform cut in basis points, within [0, 1000]
    pub platform_fee_bps: u32,

    /// Smallest accepted contribution (0 disables the check)
    pub minimum_contribution: Amount,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            platform_fee_bps: DEFAULT_PLATFORM_FEE_BPS,
            minimum_contribution: 0,
        }
    }
}

impl FeePolicy {
    /// Create policy, rejecting rates above the cap
    pub fn new(platform_fee_bps: u32, minimum_contribution: Amount) -> Result<Self> {
        validate_fee_bps(platform_fee_bps)?;
        Ok(Self {
            platform_fee_bps,
            minimum_contribution,
        })
    }

    /// floor(amount × bps / 10000)
    pub fn calculate_fee(&self, amount: Amount) -> Amount {
        let bps = u128::from(self.platform_fee_bps);
        match amount.checked_mul(bps) {
            Some(scaled) => scaled / BPS_DENOMINATOR,
            // Only reachable near u128::MAX; divide first, never overshooting the exact fee
            None => (amount / BPS_DENOMINATOR) * bps,
        }
    }

    /// Split `amount` into (net to owner, fee to platform)
    pub fn split(&self, amount: Amount) -> Result<(Amount, Amount)> {
        let fee = self.calculate_fee(amount);
        let net = amount.checked_sub(fee).ok_or_else(|| {
            Error::InvalidAmount(format!(
                "Fee {} exceeds amount {} at {} bps",
                fee, amount, self.platform_fee_bps
            ))
        })?;
        Ok((net, fee))
    }

    /// Check a contribution against the minimum
    pub fn check_contribution(&self, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount(
                "Contribution must be positive".to_string(),
            ));
        }
        if amount < self.minimum_contribution {
            return Err(Error::InvalidAmount(format!(
                "Contribution {} below minimum {}",
                amount, self.minimum_contribution
            )));
        }
        Ok(())
    }
}

/// Reject fee rates above [`MAX_PLATFORM_FEE_BPS`]
pub fn validate_fee_bps(bps: u32) -> Result<()> {
    if bps > MAX_PLATFORM_FEE_BPS {
        return Err(Error::InvalidAmount(format!(
            "Platform fee {} bps exceeds maximum {}",
            bps, MAX_PLATFORM_FEE_BPS
        )));
    }
    Ok(())
}
