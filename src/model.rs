//! Core domain types for the earnings ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Amount;

/// User identifier. Maps 1:1 to the authenticated principal supplied by
/// the external identity provider.
pub type UserId = u64;

/// Task identifier, assigned by the admin task feed.
pub type TaskId = u32;

/// Ledger transaction identifier.
pub type TxId = u64;

/// Task completion record identifier.
pub type CompletionId = u64;

/// Referral commission record identifier.
pub type ReferralId = u64;

/// Withdrawal request identifier.
pub type WithdrawalId = u64;

/// A command representing the possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Create a user account, optionally linked to a referrer's code.
    Signup {
        user: UserId,
        referral_code: Option<String>,
    },
    /// Payment-processor callback: the user's registration payment went
    /// through. Delivered at least once, so handling must be idempotent.
    ConfirmPayment { user: UserId },
    /// Credit the user for completing a task.
    CompleteTask { user: UserId, task: TaskId },
    /// Reserve funds and open a withdrawal request.
    RequestWithdrawal {
        user: UserId,
        amount: Amount,
        bank: BankDetails,
    },
    /// Operator action moving a withdrawal request through its lifecycle.
    ResolveWithdrawal {
        request: WithdrawalId,
        outcome: ResolveOutcome,
        notes: Option<String>,
    },
}

/// Category of a task, as authored in the admin feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    WatchAd,
    SocialMedia,
    Survey,
    Other,
}

/// A task users can complete for a fixed reward. Read-only configuration,
/// owned by the admin surface.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    /// Fixed reward credited on completion. Always positive.
    pub reward: Amount,
    pub active: bool,
    pub url: String,
}

/// Record of a user completing a task. At most one exists per
/// (user, task) pair; this is the task-claim idempotency key.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub id: CompletionId,
    pub user: UserId,
    pub task: TaskId,
    /// Reward credited at completion time (tasks may be retired later).
    pub reward: Amount,
    pub completed_at: DateTime<Utc>,
}

/// What a ledger entry pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    TaskReward,
    RegistrationBonus,
    ReferralBonus,
    Withdrawal,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxKind::TaskReward => "task_reward",
            TxKind::RegistrationBonus => "registration_bonus",
            TxKind::ReferralBonus => "referral_bonus",
            TxKind::Withdrawal => "withdrawal",
        };
        f.write_str(s)
    }
}

/// Settlement status of a ledger entry. Only completed entries count
/// towards a wallet balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// A ledger entry. Append-only: entries are never mutated or deleted,
/// and the sum of a user's completed entries equals their wallet balance.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TxId,
    pub user: UserId,
    /// Signed: credits positive, debits negative.
    pub amount: Amount,
    pub kind: TxKind,
    pub description: String,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
}

/// Progress of a user's registration payment with the external processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Unpaid => "unpaid",
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// Distance between the referrer being paid and the newly registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Direct referrer.
    First,
    /// Referrer's referrer.
    Second,
}

impl Generation {
    pub fn as_u8(self) -> u8 {
        match self {
            Generation::First => 1,
            Generation::Second => 2,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Commission paid to an ancestor in the referral chain. At most one
/// exists per (referrer, referred, generation) triple.
#[derive(Debug, Clone)]
pub struct Referral {
    pub id: ReferralId,
    pub referrer: UserId,
    pub referred: UserId,
    pub generation: Generation,
    pub bonus: Amount,
    pub paid_at: DateTime<Utc>,
}

/// Destination account for a withdrawal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

/// Lifecycle of a withdrawal request.
///
/// `Pending -> Approved -> Completed`, or `Pending -> Rejected`.
/// `Rejected` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WithdrawalStatus {
    #[default]
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Operator decision applied to a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Approve,
    Complete,
    Reject,
}

/// A withdrawal request. Funds are reserved (debited) when the request is
/// created, not when it is approved.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub user: UserId,
    /// Requested amount, always positive.
    pub amount: Amount,
    pub bank: BankDetails,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}
