//! Withdrawal requests and their approval lifecycle.
//!
//! Funds are reserved the moment a request is accepted: the wallet is
//! debited up front, so overlapping requests can never jointly exceed a
//! balance. Rejection refunds the reservation with a compensating entry.

use chrono::Utc;
use tracing::info;

use crate::Amount;
use crate::model::{
    BankDetails, ResolveOutcome, TxKind, UserId, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};

use super::Engine;
use super::error::{EngineError, LedgerError, NotFound, WithdrawalError};

impl Engine {
    /// Open a withdrawal request, debiting the wallet immediately.
    ///
    /// Fails with `InvalidAmount` below the configured minimum and with
    /// `InsufficientFunds` if the wallet cannot cover the debit; neither
    /// failure records anything.
    pub fn request_withdrawal(
        &mut self,
        user: UserId,
        amount: Amount,
        bank: BankDetails,
    ) -> Result<WithdrawalId, EngineError> {
        if !amount.is_positive() || amount < self.config.min_withdrawal {
            return Err(
                WithdrawalError::InvalidAmount(amount, self.config.min_withdrawal).into(),
            );
        }

        let account = self.users.get_mut(&user).ok_or(NotFound::User(user))?;
        let tx = self
            .ledger
            .record(
                account,
                -amount,
                TxKind::Withdrawal,
                format!("Withdrawal to {}", bank.bank_name),
            )
            .map_err(|e| match e {
                LedgerError::InsufficientFunds(user, balance, _) => {
                    WithdrawalError::InsufficientFunds(user, balance, amount)
                }
            })?;

        let id = self.next_withdrawal;
        self.next_withdrawal += 1;
        self.withdrawals.insert(
            id,
            WithdrawalRequest {
                id,
                user,
                amount,
                bank,
                status: WithdrawalStatus::Pending,
                requested_at: Utc::now(),
                resolved_at: None,
                notes: None,
            },
        );
        info!(user, request = id, %amount, tx, "withdrawal requested, funds reserved");

        Ok(id)
    }

    /// Operator action moving a request through its lifecycle.
    ///
    /// `Approve` and `Reject` act on `Pending` requests; `Complete` on
    /// `Approved` ones. Rejection reverses the reservation with a
    /// compensating positive entry. Anything else is `InvalidTransition`.
    pub fn resolve_withdrawal(
        &mut self,
        request: WithdrawalId,
        outcome: ResolveOutcome,
        notes: Option<String>,
    ) -> Result<(), EngineError> {
        let found = self
            .withdrawals
            .get(&request)
            .ok_or(NotFound::Request(request))?;

        let next = match (found.status, outcome) {
            (WithdrawalStatus::Pending, ResolveOutcome::Approve) => WithdrawalStatus::Approved,
            (WithdrawalStatus::Pending, ResolveOutcome::Reject) => WithdrawalStatus::Rejected,
            (WithdrawalStatus::Approved, ResolveOutcome::Complete) => WithdrawalStatus::Completed,
            (status, outcome) => {
                return Err(WithdrawalError::InvalidTransition(request, status, outcome).into());
            }
        };

        if next == WithdrawalStatus::Rejected {
            let (user, amount) = (found.user, found.amount);
            let account = self.users.get_mut(&user).ok_or(NotFound::User(user))?;
            self.ledger.record(
                account,
                amount,
                TxKind::Withdrawal,
                format!("Refund for rejected withdrawal request {request}"),
            )?;
        }

        let found = self
            .withdrawals
            .get_mut(&request)
            .ok_or(NotFound::Request(request))?;
        found.status = next;
        found.resolved_at = Some(Utc::now());
        if notes.is_some() {
            found.notes = notes;
        }
        info!(request, status = %next, "withdrawal resolved");

        Ok(())
    }

    pub fn withdrawal(&self, request: WithdrawalId) -> Option<&WithdrawalRequest> {
        self.withdrawals.get(&request)
    }

    /// One user's withdrawal requests, oldest first.
    pub fn withdrawals_for(&self, user: UserId) -> Vec<&WithdrawalRequest> {
        let mut requests: Vec<&WithdrawalRequest> = self
            .withdrawals
            .values()
            .filter(|r| r.user == user)
            .collect();
        requests.sort_by_key(|r| r.id);
        requests
    }
}
