//! CSV surfaces: the admin task feed, the event stream, and the account
//! summary export.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::Amount;
use crate::engine::UserAccount;
use crate::model::{
    BankDetails, Command, ResolveOutcome, Task, TaskId, TaskType, UserId, WithdrawalId,
};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized event type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct TaskRow {
    id: TaskId,
    title: String,
    description: String,
    task_type: TaskType,
    reward: i64,
    active: bool,
    url: String,
}

#[derive(Debug, Deserialize)]
struct EventRow {
    r#type: String,
    user: Option<UserId>,
    task: Option<TaskId>,
    amount: Option<i64>,
    code: Option<String>,
    request: Option<WithdrawalId>,
    outcome: Option<ResolveOutcome>,
    bank_name: Option<String>,
    account_number: Option<String>,
    account_name: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    user: UserId,
    balance: i64,
    total_earned: i64,
    registration: String,
    bonus_claimed: bool,
}

/// Read the admin task feed from a csv file
pub fn read_tasks(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Task, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open task csv file");

    reader
        .into_deserialize::<TaskRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            Ok(Task {
                id: row.id,
                title: row.title,
                description: row.description,
                task_type: row.task_type,
                reward: Amount::from_units(row.reward),
                active: row.active,
                url: row.url,
            })
        })
}

/// Read engine commands from an event csv file
pub fn read_events(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Command, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open event csv file");

    reader
        .into_deserialize::<EventRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row_to_command(line, row)
        })
}

fn row_to_command(line: usize, row: EventRow) -> Result<Command, CsvError> {
    let kind = row.r#type;
    match kind.as_str() {
        "signup" => Ok(Command::Signup {
            user: require(row.user, line, &kind, "user")?,
            referral_code: row.code,
        }),
        "payment" => Ok(Command::ConfirmPayment {
            user: require(row.user, line, &kind, "user")?,
        }),
        "task" => Ok(Command::CompleteTask {
            user: require(row.user, line, &kind, "user")?,
            task: require(row.task, line, &kind, "task")?,
        }),
        "withdraw" => Ok(Command::RequestWithdrawal {
            user: require(row.user, line, &kind, "user")?,
            amount: Amount::from_units(require(row.amount, line, &kind, "amount")?),
            bank: BankDetails {
                bank_name: require(row.bank_name, line, &kind, "bank_name")?,
                account_number: require(row.account_number, line, &kind, "account_number")?,
                account_name: require(row.account_name, line, &kind, "account_name")?,
            },
        }),
        "resolve" => Ok(Command::ResolveWithdrawal {
            request: require(row.request, line, &kind, "request")?,
            outcome: require(row.outcome, line, &kind, "outcome")?,
            notes: row.notes,
        }),
        _ => Err(CsvError::UnrecognizedType { line, kind }),
    }
}

fn require<T>(
    value: Option<T>,
    line: usize,
    kind: &str,
    field: &'static str,
) -> Result<T, CsvError> {
    value.ok_or_else(|| CsvError::MissingField {
        line,
        kind: kind.to_string(),
        field,
    })
}

/// write account summaries to stdout in csv format
pub fn write_accounts<'a>(accounts: impl IntoIterator<Item = &'a UserAccount>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for account in accounts {
        let row = OutputRow {
            user: account.id(),
            balance: account.balance().units(),
            total_earned: account.total_earned().units(),
            registration: account.registration().to_string(),
            bonus_claimed: account.bonus_claimed(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
