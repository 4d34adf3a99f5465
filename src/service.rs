//! Concurrent front-end for the engine.
//!
//! The engine is owned by exactly one worker task; request handlers hold a
//! cloneable [`Handle`] and submit commands over a bounded channel. The
//! worker applies commands strictly in arrival order, so every
//! check-then-act sequence in the engine runs without interleaving — the
//! single-writer discipline that makes task claims, bonus claims, and
//! referral payouts race-free.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::Amount;
use crate::engine::{Engine, EngineError, Receipt};
use crate::model::{BankDetails, Command, ResolveOutcome, TaskId, UserId, WithdrawalId};

/// Depth of the command queue shared by all handles.
const COMMAND_BUFFER: usize = 64;

/// Error returned to a caller of [`Handle`] methods.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The worker task is gone; no further commands can be applied.
    #[error("engine worker has shut down")]
    Closed,
}

struct Envelope {
    cmd: Command,
    reply: oneshot::Sender<Result<Receipt, EngineError>>,
}

/// Cloneable command submission handle.
#[derive(Clone)]
pub struct Handle {
    sender: mpsc::Sender<Envelope>,
}

/// Move `engine` onto its own worker task.
///
/// Returns the submission handle and the worker's join handle, which
/// yields the engine back once every `Handle` clone has been dropped.
pub fn spawn(engine: Engine) -> (Handle, JoinHandle<Engine>) {
    let (sender, mut receiver) = mpsc::channel::<Envelope>(COMMAND_BUFFER);

    let worker = tokio::spawn(async move {
        let mut engine = engine;
        while let Some(Envelope { cmd, reply }) = receiver.recv().await {
            // A caller that gave up on its reply is not an error
            let _ = reply.send(engine.apply(cmd));
        }
        engine
    });

    (Handle { sender }, worker)
}

impl Handle {
    /// Submit a command and wait for the engine's verdict.
    pub async fn submit(&self, cmd: Command) -> Result<Receipt, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Envelope { cmd, reply })
            .await
            .map_err(|_| ServiceError::Closed)?;
        match response.await {
            Ok(result) => result.map_err(ServiceError::Engine),
            Err(_) => Err(ServiceError::Closed),
        }
    }

    pub async fn signup(
        &self,
        user: UserId,
        referral_code: Option<String>,
    ) -> Result<Receipt, ServiceError> {
        self.submit(Command::Signup {
            user,
            referral_code,
        })
        .await
    }

    pub async fn confirm_payment(&self, user: UserId) -> Result<Receipt, ServiceError> {
        self.submit(Command::ConfirmPayment { user }).await
    }

    pub async fn complete_task(
        &self,
        user: UserId,
        task: TaskId,
    ) -> Result<Receipt, ServiceError> {
        self.submit(Command::CompleteTask { user, task }).await
    }

    pub async fn request_withdrawal(
        &self,
        user: UserId,
        amount: Amount,
        bank: BankDetails,
    ) -> Result<Receipt, ServiceError> {
        self.submit(Command::RequestWithdrawal { user, amount, bank })
            .await
    }

    pub async fn resolve_withdrawal(
        &self,
        request: WithdrawalId,
        outcome: ResolveOutcome,
        notes: Option<String>,
    ) -> Result<Receipt, ServiceError> {
        self.submit(Command::ResolveWithdrawal {
            request,
            outcome,
            notes,
        })
        .await
    }
}
