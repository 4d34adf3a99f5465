use chrono::{DateTime, Utc};

use crate::Amount;
use crate::model::{RegistrationStatus, UserId};

/// Per-user mutable state: wallet, lifetime earnings, and the two
/// registration flags.
///
/// Balance fields are private; the only writer is
/// [`Ledger::record`](super::Ledger::record), which keeps the wallet in
/// lockstep with the transaction log.
#[derive(Debug)]
pub struct UserAccount {
    id: UserId,
    referral_code: String,
    referred_by: Option<UserId>,
    wallet_balance: Amount,
    total_earned: Amount,
    registration: RegistrationStatus,
    bonus_claimed: bool,
    created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(id: UserId, referral_code: String, referred_by: Option<UserId>) -> Self {
        Self {
            id,
            referral_code,
            referred_by,
            wallet_balance: Amount::ZERO,
            total_earned: Amount::ZERO,
            registration: RegistrationStatus::default(),
            bonus_claimed: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn referral_code(&self) -> &str {
        &self.referral_code
    }

    pub fn referred_by(&self) -> Option<UserId> {
        self.referred_by
    }

    /// Spendable units currently available.
    pub fn balance(&self) -> Amount {
        self.wallet_balance
    }

    /// Lifetime sum of all positive credits. Never decreases.
    pub fn total_earned(&self) -> Amount {
        self.total_earned
    }

    pub fn registration(&self) -> RegistrationStatus {
        self.registration
    }

    pub fn bonus_claimed(&self) -> bool {
        self.bonus_claimed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether posting `amount` would keep the wallet non-negative.
    pub(crate) fn can_post(&self, amount: Amount) -> bool {
        !(self.wallet_balance + amount).is_negative()
    }

    /// Apply a signed ledger amount to the wallet. `earns` marks credits
    /// that count toward lifetime earnings (rewards and bonuses, not
    /// withdrawal refunds). Callers must have checked `can_post` first.
    pub(crate) fn post(&mut self, amount: Amount, earns: bool) {
        debug_assert!(amount.is_positive() || !earns);
        self.wallet_balance += amount;
        if earns {
            self.total_earned += amount;
        }
        debug_assert!(!self.wallet_balance.is_negative());
        debug_assert!(self.wallet_balance <= self.total_earned);
    }

    /// Record that the user was handed off to the payment processor.
    pub(crate) fn begin_payment(&mut self) -> bool {
        match self.registration {
            RegistrationStatus::Unpaid | RegistrationStatus::Pending => {
                self.registration = RegistrationStatus::Pending;
                true
            }
            RegistrationStatus::Paid => false,
        }
    }

    /// Transition the registration to `Paid`. Returns `false` if it
    /// already was, so retried callbacks are detectable.
    pub(crate) fn mark_paid(&mut self) -> bool {
        match self.registration {
            RegistrationStatus::Paid => false,
            _ => {
                self.registration = RegistrationStatus::Paid;
                true
            }
        }
    }

    /// One-shot claim of the registration bonus. The check and the flag
    /// set happen in a single call so there is no re-claim window.
    pub(crate) fn claim_bonus(&mut self) -> bool {
        if self.bonus_claimed {
            false
        } else {
            self.bonus_claimed = true;
            true
        }
    }
}
