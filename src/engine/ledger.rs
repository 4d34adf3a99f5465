//! Append-only transaction log and the single atomic balance writer.

use chrono::Utc;

use crate::Amount;
use crate::model::{Transaction, TxId, TxKind, TxStatus, UserId};

use super::error::LedgerError;
use super::state::UserAccount;

/// Durable record of every balance-affecting event.
///
/// Entries are append-only and ids are dense and ascending. Balances are
/// only ever touched here, in the same call that appends the entry, so a
/// wallet can never drift from its transaction history.
#[derive(Debug)]
pub struct Ledger {
    entries: Vec<Transaction>,
    next_id: TxId,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Append an entry and apply it to the wallet as one unit.
    ///
    /// A debit that would drive the wallet negative is rejected before
    /// anything is written, so a failed record leaves no trace.
    pub fn record(
        &mut self,
        account: &mut UserAccount,
        amount: Amount,
        kind: TxKind,
        description: String,
    ) -> Result<TxId, LedgerError> {
        if !account.can_post(amount) {
            return Err(LedgerError::InsufficientFunds(
                account.id(),
                account.balance(),
                amount,
            ));
        }

        let id = self.next_id;
        self.next_id += 1;

        // Refunds of rejected withdrawals restore the balance but are not
        // earnings; every other positive entry is.
        let earns = amount.is_positive() && kind != TxKind::Withdrawal;
        account.post(amount, earns);
        self.entries.push(Transaction {
            id,
            user: account.id(),
            amount,
            kind,
            description,
            status: TxStatus::Completed,
            created_at: Utc::now(),
        });

        Ok(id)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn get(&self, id: TxId) -> Option<&Transaction> {
        // ids are assigned in insertion order
        self.entries
            .binary_search_by_key(&id, |tx| tx.id)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// One user's statement, oldest first.
    pub fn for_user(&self, user: UserId) -> impl Iterator<Item = &Transaction> + '_ {
        self.entries.iter().filter(move |tx| tx.user == user)
    }

    /// Sum of completed entry amounts for `user`.
    ///
    /// This is the audit value: it must equal the user's wallet balance
    /// at all times.
    pub fn completed_total(&self, user: UserId) -> Amount {
        self.for_user(user)
            .filter(|tx| tx.status == TxStatus::Completed)
            .map(|tx| tx.amount)
            .sum()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: UserId) -> UserAccount {
        UserAccount::new(id, format!("PK{id:06}"), None)
    }

    #[test]
    fn record_credit_appends_and_updates_balance() {
        let mut ledger = Ledger::new();
        let mut acc = account(1);

        let id = ledger
            .record(
                &mut acc,
                Amount::from_units(200),
                TxKind::TaskReward,
                "Completed task: Watch intro ad".into(),
            )
            .unwrap();

        assert_eq!(acc.balance(), Amount::from_units(200));
        assert_eq!(acc.total_earned(), Amount::from_units(200));

        let tx = ledger.get(id).unwrap();
        assert_eq!(tx.user, 1);
        assert_eq!(tx.amount, Amount::from_units(200));
        assert_eq!(tx.kind, TxKind::TaskReward);
        assert_eq!(tx.status, TxStatus::Completed);
    }

    #[test]
    fn record_overdraft_fails_and_writes_nothing() {
        let mut ledger = Ledger::new();
        let mut acc = account(1);
        ledger
            .record(
                &mut acc,
                Amount::from_units(100),
                TxKind::TaskReward,
                "reward".into(),
            )
            .unwrap();

        let result = ledger.record(
            &mut acc,
            Amount::from_units(-101),
            TxKind::Withdrawal,
            "withdrawal".into(),
        );
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds(1, _, _))
        ));

        // Balance and log untouched
        assert_eq!(acc.balance(), Amount::from_units(100));
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.completed_total(1), acc.balance());
    }

    #[test]
    fn debit_to_exactly_zero_succeeds() {
        let mut ledger = Ledger::new();
        let mut acc = account(1);
        ledger
            .record(
                &mut acc,
                Amount::from_units(100),
                TxKind::TaskReward,
                "reward".into(),
            )
            .unwrap();
        ledger
            .record(
                &mut acc,
                Amount::from_units(-100),
                TxKind::Withdrawal,
                "withdrawal".into(),
            )
            .unwrap();

        assert_eq!(acc.balance(), Amount::ZERO);
        assert_eq!(acc.total_earned(), Amount::from_units(100));
    }

    #[test]
    fn completed_total_tracks_balance_per_user() {
        let mut ledger = Ledger::new();
        let mut a = account(1);
        let mut b = account(2);

        for (who, units) in [(1u64, 500i64), (2, 300), (1, -200)] {
            let acc = if who == 1 { &mut a } else { &mut b };
            let kind = if units < 0 {
                TxKind::Withdrawal
            } else {
                TxKind::TaskReward
            };
            ledger
                .record(acc, Amount::from_units(units), kind, "entry".into())
                .unwrap();
        }

        assert_eq!(ledger.completed_total(1), a.balance());
        assert_eq!(ledger.completed_total(2), b.balance());
        assert_eq!(ledger.completed_total(1), Amount::from_units(300));
        assert_eq!(ledger.completed_total(2), Amount::from_units(300));
    }

    #[test]
    fn ids_are_dense_and_lookup_works() {
        let mut ledger = Ledger::new();
        let mut acc = account(1);
        for _ in 0..5 {
            ledger
                .record(
                    &mut acc,
                    Amount::from_units(10),
                    TxKind::TaskReward,
                    "reward".into(),
                )
                .unwrap();
        }
        assert_eq!(
            ledger.entries().iter().map(|tx| tx.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(ledger.get(3).is_some());
        assert!(ledger.get(6).is_none());
    }
}
