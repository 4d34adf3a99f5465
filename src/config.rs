//! Reward and withdrawal constants.

use serde::Deserialize;

use crate::Amount;

/// Fixed amounts the engine credits and the withdrawal floor.
///
/// Values are whole currency units. The defaults match the production
/// program: 2000 registration bonus, 1000 / 250 for generation-1 and
/// generation-2 referral commissions, 1000 minimum withdrawal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// One-time bonus credited when a registration payment is confirmed.
    pub registration_bonus: Amount,
    /// Commission paid to the direct referrer.
    pub gen1_bonus: Amount,
    /// Commission paid to the referrer's referrer.
    pub gen2_bonus: Amount,
    /// Smallest withdrawal a user may request.
    pub min_withdrawal: Amount,
    /// Treat every signup as already paid, skipping the payment processor.
    /// Off in production; only staging environments set this.
    pub bypass_registration_payment: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registration_bonus: Amount::from_units(2000),
            gen1_bonus: Amount::from_units(1000),
            gen2_bonus: Amount::from_units(250),
            min_withdrawal: Amount::from_units(1000),
            bypass_registration_payment: false,
        }
    }
}
