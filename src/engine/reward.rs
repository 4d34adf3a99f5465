//! Reward events: task completions and the registration bonus.
//!
//! Both operations are idempotent: a task pays once per (user, task), the
//! registration bonus pays once per user. All validation happens before
//! the first mutation, so a rejected event leaves no trace.

use chrono::Utc;
use tracing::info;

use crate::model::{RegistrationStatus, TaskCompletion, TaskId, TxId, TxKind, UserId};

use super::Engine;
use super::error::{EngineError, NotFound, RewardError};

impl Engine {
    /// Credit `task`'s fixed reward to `user`, once.
    ///
    /// The (user, task) completion key is checked and inserted within this
    /// single call, so two racing claims for the same task resolve to one
    /// credit: the loser gets [`RewardError::AlreadyCompleted`].
    pub fn award_task(&mut self, user: UserId, task: TaskId) -> Result<TxId, EngineError> {
        let Some(found) = self.tasks.get(&task) else {
            return Err(NotFound::Task(task).into());
        };
        if !found.active {
            return Err(RewardError::TaskInactive(task).into());
        }
        if self.completions.contains_key(&(user, task)) {
            return Err(RewardError::AlreadyCompleted(user, task).into());
        }

        let reward = found.reward;
        let description = format!("Completed task: {}", found.title);
        let account = self.users.get_mut(&user).ok_or(NotFound::User(user))?;

        let tx = self
            .ledger
            .record(account, reward, TxKind::TaskReward, description)?;

        let id = self.next_completion;
        self.next_completion += 1;
        self.completions.insert(
            (user, task),
            TaskCompletion {
                id,
                user,
                task,
                reward,
                completed_at: Utc::now(),
            },
        );

        Ok(tx)
    }

    /// Credit the one-time registration bonus.
    ///
    /// Preconditions: the registration payment is confirmed and the bonus
    /// has not been claimed. Safe to call repeatedly (e.g. from a retried
    /// payment callback): later calls fail with
    /// [`RewardError::AlreadyClaimed`] without crediting anything.
    pub fn award_registration_bonus(&mut self, user: UserId) -> Result<TxId, EngineError> {
        let account = self.users.get_mut(&user).ok_or(NotFound::User(user))?;
        if account.registration() != RegistrationStatus::Paid {
            return Err(RewardError::RegistrationUnpaid(user).into());
        }
        if account.bonus_claimed() {
            return Err(RewardError::AlreadyClaimed(user).into());
        }

        let tx = self.ledger.record(
            account,
            self.config.registration_bonus,
            TxKind::RegistrationBonus,
            "Registration bonus".into(),
        )?;
        let claimed = account.claim_bonus();
        debug_assert!(claimed);

        Ok(tx)
    }

    /// Payment-processor callback: `user`'s registration payment went
    /// through.
    ///
    /// Transitions the registration to paid, claims the bonus at most
    /// once, and pays referral commissions up the chain. Delivery is
    /// at-least-once, so the whole operation is a safe retry: a second
    /// call credits nothing new but will finish a partially applied
    /// commission fan-out.
    pub fn confirm_registration_payment(
        &mut self,
        user: UserId,
    ) -> Result<(Option<TxId>, Vec<TxId>), EngineError> {
        let account = self.users.get_mut(&user).ok_or(NotFound::User(user))?;
        if account.mark_paid() {
            info!(user, "registration payment confirmed");
        }

        let bonus = match self.award_registration_bonus(user) {
            Ok(tx) => Some(tx),
            Err(EngineError::Reward(RewardError::AlreadyClaimed(_))) => None,
            Err(e) => return Err(e),
        };
        let commissions = self.pay_referral_commissions(user)?;

        Ok((bonus, commissions))
    }
}
