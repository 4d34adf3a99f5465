//! Two-generation referral commission calculator.

use chrono::Utc;
use tracing::info;

use crate::Amount;
use crate::model::{Generation, Referral, TxId, TxKind, UserId};

use super::Engine;
use super::error::{EngineError, NotFound};

/// Aggregate view of one user's referral earnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferralStats {
    pub generation1: usize,
    pub generation2: usize,
    pub total_earned: Amount,
}

impl Engine {
    /// Walk `referred`'s referral chain and credit each eligible ancestor.
    ///
    /// Exactly two generations are paid; the chain is not walked further.
    /// Each payout is keyed by (referrer, referred, generation), so a
    /// retried trigger pays no one twice — a missing or already-credited
    /// ancestor is a no-op, not an error.
    pub(super) fn pay_referral_commissions(
        &mut self,
        referred: UserId,
    ) -> Result<Vec<TxId>, EngineError> {
        let mut credited = Vec::new();

        let Some(gen1) = self.users.get(&referred).and_then(|a| a.referred_by()) else {
            return Ok(credited);
        };
        if let Some(tx) = self.pay_commission(gen1, referred, Generation::First)? {
            credited.push(tx);
        }

        if let Some(gen2) = self.users.get(&gen1).and_then(|a| a.referred_by()) {
            if let Some(tx) = self.pay_commission(gen2, referred, Generation::Second)? {
                credited.push(tx);
            }
        }

        Ok(credited)
    }

    /// Credit one ancestor unless this (referrer, referred, generation)
    /// was already paid. Returns the ledger entry when a payout happened.
    fn pay_commission(
        &mut self,
        referrer: UserId,
        referred: UserId,
        generation: Generation,
    ) -> Result<Option<TxId>, EngineError> {
        let key = (referrer, referred, generation);
        if self.referrals.contains_key(&key) {
            return Ok(None);
        }

        let bonus = match generation {
            Generation::First => self.config.gen1_bonus,
            Generation::Second => self.config.gen2_bonus,
        };
        let description = format!("Referral bonus (generation {generation})");
        let account = self.users.get_mut(&referrer).ok_or(NotFound::User(referrer))?;
        let tx = self
            .ledger
            .record(account, bonus, TxKind::ReferralBonus, description)?;

        let id = self.next_referral;
        self.next_referral += 1;
        self.referrals.insert(
            key,
            Referral {
                id,
                referrer,
                referred,
                generation,
                bonus,
                paid_at: Utc::now(),
            },
        );
        info!(
            referrer,
            referred,
            generation = generation.as_u8(),
            %bonus,
            "referral commission paid"
        );

        Ok(Some(tx))
    }

    /// Commission records where `user` is the referrer, in payout order.
    pub fn referrals_for(&self, user: UserId) -> Vec<&Referral> {
        let mut records: Vec<&Referral> = self
            .referrals
            .values()
            .filter(|r| r.referrer == user)
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Counts and earnings backing the referral dashboard.
    pub fn referral_stats(&self, user: UserId) -> ReferralStats {
        let mut stats = ReferralStats::default();
        for record in self.referrals.values().filter(|r| r.referrer == user) {
            match record.generation {
                Generation::First => stats.generation1 += 1,
                Generation::Second => stats.generation2 += 1,
            }
            stats.total_earned += record.bonus;
        }
        stats
    }
}
