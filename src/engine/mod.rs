//! Earnings engine: wallets, reward events, referral commissions, and
//! withdrawals.
//!
//! The engine owns all mutable state and applies one [`Command`] at a
//! time. Every operation validates before it mutates, so a failed command
//! leaves state exactly as it found it; every idempotency check and its
//! matching insert happen inside a single `&mut self` call. Concurrent
//! callers go through [`crate::service`], which serializes commands onto
//! one engine-owning task.

use std::collections::HashMap;

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::Amount;
use crate::config::Config;
use crate::model::{
    Command, CompletionId, Generation, Referral, ReferralId, Task, TaskCompletion, TaskId,
    Transaction, TxId, UserId, WithdrawalId, WithdrawalRequest,
};

mod state;
pub use state::UserAccount;

mod ledger;
pub use ledger::Ledger;

mod error;
pub use error::{
    EngineError, LedgerError, NotFound, RewardError, SignupError, WithdrawalError,
};

mod referral;
pub use referral::ReferralStats;

mod reward;
mod withdrawal;

/// Successful result of applying a [`Command`].
#[derive(Debug)]
pub enum Receipt {
    SignedUp(UserId),
    /// Bonus entry if this delivery claimed it, plus any commission
    /// entries paid up the referral chain.
    PaymentConfirmed {
        bonus: Option<TxId>,
        commissions: Vec<TxId>,
    },
    TaskRewarded(TxId),
    WithdrawalRequested(WithdrawalId),
    WithdrawalResolved(WithdrawalId),
}

/// Aggregate counters backing the admin overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub users: usize,
    /// Outstanding liability: sum of all wallet balances.
    pub wallet_total: Amount,
    /// Lifetime credits across all users.
    pub earned_total: Amount,
    pub pending_withdrawals: usize,
}

/// The earnings engine.
///
/// Maintains user accounts, the transaction ledger, and the idempotency
/// indexes for task claims and referral payouts.
pub struct Engine {
    config: Config,
    users: HashMap<UserId, UserAccount>,
    /// Referral code -> owner. Codes are never reused.
    codes: HashMap<String, UserId>,
    /// Read-only task configuration from the admin feed.
    tasks: HashMap<TaskId, Task>,
    /// Task-claim idempotency index.
    completions: HashMap<(UserId, TaskId), TaskCompletion>,
    ledger: Ledger,
    /// Referral-payout idempotency index.
    referrals: HashMap<(UserId, UserId, Generation), Referral>,
    withdrawals: HashMap<WithdrawalId, WithdrawalRequest>,
    next_completion: CompletionId,
    next_referral: ReferralId,
    next_withdrawal: WithdrawalId,
}

/// Public API
impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            users: HashMap::new(),
            codes: HashMap::new(),
            tasks: HashMap::new(),
            completions: HashMap::new(),
            ledger: Ledger::new(),
            referrals: HashMap::new(),
            withdrawals: HashMap::new(),
            next_completion: 1,
            next_referral: 1,
            next_withdrawal: 1,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Install the admin-managed task feed. Tasks are read-only to the
    /// engine; reloading replaces earlier definitions by id.
    pub fn load_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        for task in tasks {
            self.tasks.insert(task.id, task);
        }
    }

    /// Run the engine over the given command stream.
    ///
    /// Command failures are logged and skipped; they never stop the run.
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(cmd) = stream.next().await {
            let _ = self.apply(cmd);
        }
    }

    /// Apply a single command on top of the current engine state.
    pub fn apply(&mut self, cmd: Command) -> Result<Receipt, EngineError> {
        match cmd {
            Command::Signup {
                user,
                referral_code,
            } => {
                let result = self
                    .signup(user, referral_code.as_deref())
                    .map(|_| Receipt::SignedUp(user));
                Self::log_result("signup", user, &result);
                result
            }
            Command::ConfirmPayment { user } => {
                let result = self.confirm_registration_payment(user).map(
                    |(bonus, commissions)| Receipt::PaymentConfirmed { bonus, commissions },
                );
                Self::log_result("confirm_payment", user, &result);
                result
            }
            Command::CompleteTask { user, task } => {
                let result = self.award_task(user, task).map(Receipt::TaskRewarded);
                Self::log_result("complete_task", user, &result);
                result
            }
            Command::RequestWithdrawal { user, amount, bank } => {
                let result = self
                    .request_withdrawal(user, amount, bank)
                    .map(Receipt::WithdrawalRequested);
                Self::log_result("request_withdrawal", user, &result);
                result
            }
            Command::ResolveWithdrawal {
                request,
                outcome,
                notes,
            } => {
                let result = self
                    .resolve_withdrawal(request, outcome, notes)
                    .map(|_| Receipt::WithdrawalResolved(request));
                match &result {
                    Ok(_) => info!(request, "resolve_withdrawal applied"),
                    Err(e) => info!(request, reason = %e, "resolve_withdrawal rejected"),
                }
                result
            }
        }
    }

    /// Create a user account, resolving the optional referral code.
    ///
    /// An unknown code links no referrer and is not an error. With the
    /// registration-payment bypass enabled, the account is immediately
    /// taken through the payment-confirmed path.
    pub fn signup(
        &mut self,
        user: UserId,
        referral_code: Option<&str>,
    ) -> Result<(), EngineError> {
        if self.users.contains_key(&user) {
            return Err(SignupError::AlreadyRegistered(user).into());
        }

        let referred_by = referral_code.and_then(|code| match self.codes.get(code) {
            Some(&owner) => Some(owner),
            None => {
                debug!(user, code, "unknown referral code, no referrer linked");
                None
            }
        });

        let code = Self::mint_code(user);
        self.codes.insert(code.clone(), user);
        self.users
            .insert(user, UserAccount::new(user, code, referred_by));

        if self.config.bypass_registration_payment {
            self.confirm_registration_payment(user)?;
        }

        Ok(())
    }

    /// Record that `user` was handed off to the payment processor. A
    /// no-op once the registration is paid.
    pub fn begin_registration_payment(&mut self, user: UserId) -> Result<(), EngineError> {
        let account = self.users.get_mut(&user).ok_or(NotFound::User(user))?;
        if !account.begin_payment() {
            debug!(user, "registration already paid, payment not restarted");
        }
        Ok(())
    }

    pub fn account(&self, user: UserId) -> Option<&UserAccount> {
        self.users.get(&user)
    }

    /// All user accounts, in no particular order.
    pub fn accounts(&self) -> impl Iterator<Item = &UserAccount> + '_ {
        self.users.values()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.values()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// One user's statement, oldest first.
    pub fn transactions_for(&self, user: UserId) -> impl Iterator<Item = &Transaction> + '_ {
        self.ledger.for_user(user)
    }

    pub fn completions_for(&self, user: UserId) -> impl Iterator<Item = &TaskCompletion> + '_ {
        self.completions
            .iter()
            .filter(move |((owner, _), _)| *owner == user)
            .map(|(_, completion)| completion)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            users: self.users.len(),
            wallet_total: self.users.values().map(|a| a.balance()).sum(),
            earned_total: self.users.values().map(|a| a.total_earned()).sum(),
            pending_withdrawals: self
                .withdrawals
                .values()
                .filter(|r| r.status == crate::model::WithdrawalStatus::Pending)
                .count(),
        }
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result(op: &str, user: UserId, result: &Result<Receipt, EngineError>) {
        match result {
            Ok(receipt) => {
                info!(user, ?receipt, "{op} applied");
            }
            Err(e) => {
                info!(user, reason = %e, "{op} rejected");
            }
        }
    }

    /// Referral codes derive from the user id, which is unique and never
    /// reassigned, so codes are unique and never reused.
    fn mint_code(user: UserId) -> String {
        format!("PK{user:06}")
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BankDetails, ResolveOutcome, TaskType, TxKind};

    // test utils

    fn task(id: TaskId, reward: i64) -> Task {
        Task {
            id,
            title: format!("Task {id}"),
            description: "a task".into(),
            task_type: TaskType::WatchAd,
            reward: Amount::from_units(reward),
            active: true,
            url: "https://example.com".into(),
        }
    }

    fn bank() -> BankDetails {
        BankDetails {
            bank_name: "Access Bank".into(),
            account_number: "0123456789".into(),
            account_name: "Ada Obi".into(),
        }
    }

    fn engine() -> Engine {
        let mut engine = Engine::default();
        engine.load_tasks([task(1, 200), task(2, 500)]);
        engine
    }

    /// Balance equals the sum of completed ledger entries, and never
    /// exceeds lifetime earnings, for every user.
    fn assert_consistent(engine: &Engine) {
        for account in engine.accounts() {
            assert_eq!(
                account.balance(),
                engine.ledger().completed_total(account.id()),
                "wallet drifted from ledger for user {}",
                account.id()
            );
            assert!(account.balance() <= account.total_earned());
        }
    }

    // Signup

    #[test]
    fn new_engine_is_empty() {
        let engine = Engine::default();
        assert_eq!(engine.accounts().count(), 0);
        assert_eq!(engine.summary().users, 0);
    }

    #[test]
    fn signup_creates_account_with_unique_code() {
        let mut engine = engine();
        engine.signup(1, None).unwrap();
        engine.signup(2, None).unwrap();

        let a = engine.account(1).unwrap();
        let b = engine.account(2).unwrap();
        assert_eq!(a.balance(), Amount::ZERO);
        assert_ne!(a.referral_code(), b.referral_code());
        assert_eq!(a.referred_by(), None);
    }

    #[test]
    fn duplicate_signup_fails() {
        let mut engine = engine();
        engine.signup(1, None).unwrap();

        let result = engine.signup(1, None);
        assert!(matches!(
            result,
            Err(EngineError::Signup(SignupError::AlreadyRegistered(1)))
        ));
    }

    #[test]
    fn signup_links_referrer_through_code() {
        let mut engine = engine();
        engine.signup(1, None).unwrap();
        let code = engine.account(1).unwrap().referral_code().to_string();

        engine.signup(2, Some(&code)).unwrap();
        assert_eq!(engine.account(2).unwrap().referred_by(), Some(1));
    }

    #[test]
    fn signup_with_unknown_code_links_nothing() {
        let mut engine = engine();
        engine.signup(1, Some("NOSUCH")).unwrap();
        assert_eq!(engine.account(1).unwrap().referred_by(), None);
    }

    #[test]
    fn signup_with_bypass_credits_bonus_immediately() {
        let mut engine = Engine::new(Config {
            bypass_registration_payment: true,
            ..Config::default()
        });
        engine.signup(1, None).unwrap();

        let account = engine.account(1).unwrap();
        assert_eq!(account.balance(), Amount::from_units(2000));
        assert!(account.bonus_claimed());
        assert_consistent(&engine);
    }

    // Command routing

    #[test]
    fn apply_routes_commands() {
        let mut engine = engine();
        let receipt = engine
            .apply(Command::Signup {
                user: 1,
                referral_code: None,
            })
            .unwrap();
        assert!(matches!(receipt, Receipt::SignedUp(1)));

        let receipt = engine
            .apply(Command::ConfirmPayment { user: 1 })
            .unwrap();
        assert!(matches!(
            receipt,
            Receipt::PaymentConfirmed { bonus: Some(_), .. }
        ));

        let receipt = engine
            .apply(Command::CompleteTask { user: 1, task: 1 })
            .unwrap();
        assert!(matches!(receipt, Receipt::TaskRewarded(_)));

        let receipt = engine
            .apply(Command::RequestWithdrawal {
                user: 1,
                amount: Amount::from_units(1000),
                bank: bank(),
            })
            .unwrap();
        let Receipt::WithdrawalRequested(request) = receipt else {
            panic!("expected withdrawal receipt");
        };

        let receipt = engine
            .apply(Command::ResolveWithdrawal {
                request,
                outcome: ResolveOutcome::Approve,
                notes: None,
            })
            .unwrap();
        assert!(matches!(receipt, Receipt::WithdrawalResolved(_)));
        assert_consistent(&engine);
    }

    #[tokio::test]
    async fn run_skips_failed_commands_and_continues() {
        let mut engine = engine();
        let commands = vec![
            Command::Signup {
                user: 1,
                referral_code: None,
            },
            Command::CompleteTask { user: 1, task: 99 }, // unknown task
            Command::CompleteTask { user: 1, task: 1 },  // still processed
        ];

        engine.run(tokio_stream::iter(commands)).await;

        assert_eq!(
            engine.account(1).unwrap().balance(),
            Amount::from_units(200)
        );
        assert_consistent(&engine);
    }

    // Accessors and summary

    #[test]
    fn summary_counts_users_liability_and_pending_withdrawals() {
        let mut engine = engine();
        engine.signup(1, None).unwrap();
        engine.signup(2, None).unwrap();
        engine.award_task(1, 1).unwrap();
        engine.award_task(2, 2).unwrap();
        engine
            .request_withdrawal(2, Amount::from_units(500), bank())
            .unwrap_err(); // below minimum, rejected
        engine.load_tasks([task(3, 1500)]);
        engine.award_task(2, 3).unwrap();
        engine
            .request_withdrawal(2, Amount::from_units(1000), bank())
            .unwrap();

        let summary = engine.summary();
        assert_eq!(summary.users, 2);
        assert_eq!(summary.wallet_total, Amount::from_units(200 + 2000 - 1000));
        assert_eq!(summary.earned_total, Amount::from_units(200 + 2000));
        assert_eq!(summary.pending_withdrawals, 1);
        assert_consistent(&engine);
    }

    #[test]
    fn statement_lists_transactions_in_order() {
        let mut engine = engine();
        engine.signup(1, None).unwrap();
        engine.award_task(1, 1).unwrap();
        engine.award_task(1, 2).unwrap();

        let kinds: Vec<TxKind> = engine.transactions_for(1).map(|tx| tx.kind).collect();
        assert_eq!(kinds, vec![TxKind::TaskReward, TxKind::TaskReward]);
        assert_eq!(engine.completions_for(1).count(), 2);
    }

    // A small earner: one task worth 200, then a withdrawal under the minimum.

    #[test]
    fn end_to_end_small_earner_cannot_withdraw_under_minimum() {
        let mut engine = engine();
        engine.signup(1, None).unwrap();
        engine.award_task(1, 1).unwrap();

        let account = engine.account(1).unwrap();
        assert_eq!(account.balance(), Amount::from_units(200));
        assert_eq!(account.total_earned(), Amount::from_units(200));

        let result = engine.request_withdrawal(1, Amount::from_units(200), bank());
        assert!(matches!(
            result,
            Err(EngineError::Withdrawal(WithdrawalError::InvalidAmount(_, _)))
        ));
        assert_eq!(
            engine.account(1).unwrap().balance(),
            Amount::from_units(200)
        );
        assert_consistent(&engine);
    }
}
