//! Error types for ledger and reward operations.
//!
//! Every error is local to the command that triggered it; none are fatal
//! to the engine.

use thiserror::Error;

use crate::Amount;
use crate::model::{ResolveOutcome, TaskId, UserId, WithdrawalId, WithdrawalStatus};

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("signup failed: {0}")]
    Signup(#[from] SignupError),

    #[error("reward failed: {0}")]
    Reward(#[from] RewardError),

    #[error("ledger rejected entry: {0}")]
    Ledger(#[from] LedgerError),

    #[error("withdrawal failed: {0}")]
    Withdrawal(#[from] WithdrawalError),

    #[error("{0}")]
    NotFound(#[from] NotFound),
}

/// Error during account creation.
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("user {0} is already registered")]
    AlreadyRegistered(UserId),
}

/// Error while crediting a reward event.
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("task {0} is not active")]
    TaskInactive(TaskId),

    #[error("user {0} already completed task {1}")]
    AlreadyCompleted(UserId, TaskId),

    #[error("registration payment for user {0} is not confirmed")]
    RegistrationUnpaid(UserId),

    #[error("user {0} already claimed the registration bonus")]
    AlreadyClaimed(UserId),
}

/// Error appending to the transaction log.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient funds for user {0}: balance {1}, change {2}")]
    InsufficientFunds(UserId, Amount, Amount),
}

/// Error in the withdrawal state machine.
#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("invalid withdrawal amount {0}: minimum is {1}")]
    InvalidAmount(Amount, Amount),

    #[error("insufficient funds for user {0}: balance {1}, requested {2}")]
    InsufficientFunds(UserId, Amount, Amount),

    #[error("request {0} is {1}; {2:?} is not a valid transition")]
    InvalidTransition(WithdrawalId, WithdrawalStatus, ResolveOutcome),
}

/// A referenced record does not exist.
#[derive(Debug, Error)]
pub enum NotFound {
    #[error("user {0} not found")]
    User(UserId),

    #[error("task {0} not found")]
    Task(TaskId),

    #[error("withdrawal request {0} not found")]
    Request(WithdrawalId),
}
