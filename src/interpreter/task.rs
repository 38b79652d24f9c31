//! Background evaluation for `async` / `await`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use super::error::InterpreterError;
use crate::value::Value;

type Outcome = Result<Value, InterpreterError>;

/// Cooperative cancellation flag shared between a future and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct FutureState {
    receiver: Receiver<Outcome>,
    deadline: Option<Instant>,
    cancel: CancelToken,
    outcome: Mutex<Option<Outcome>>,
}

/// Handle to a value being computed on a worker thread.
///
/// When the handle carries a deadline and the worker has not finished by
/// then, waiting yields `Null` and the worker is asked to stop.
#[derive(Clone)]
pub struct FutureHandle(Arc<FutureState>);

impl FutureHandle {
    pub fn spawn<F>(max_wait: Option<Duration>, work: F) -> Result<Self, InterpreterError>
    where
        F: FnOnce(CancelToken) -> Outcome + Send + 'static,
    {
        let (sender, receiver) = channel::bounded(1);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        thread::Builder::new()
            .name("quill-async".to_string())
            .spawn(move || {
                tracing::debug!("async worker started");
                let outcome = work(worker_cancel);
                tracing::debug!(ok = outcome.is_ok(), "async worker finished");
                // The receiver may already be gone; nothing to report then.
                let _ = sender.send(outcome);
            })
            .map_err(|e| InterpreterError::host(format!("cannot start async worker: {}", e)))?;

        Ok(Self(Arc::new(FutureState {
            receiver,
            deadline: max_wait.map(|wait| Instant::now() + wait),
            cancel,
            outcome: Mutex::new(None),
        })))
    }

    /// Blocks until the worker finishes or the deadline passes. Later waits
    /// return the same outcome.
    pub fn wait(&self) -> Outcome {
        let mut outcome = self.0.outcome.lock();
        if let Some(done) = outcome.as_ref() {
            return done.clone();
        }

        let received = match self.0.deadline {
            Some(deadline) => match self.0.receiver.recv_deadline(deadline) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("async wait bound elapsed; cancelling worker");
                    self.0.cancel.cancel();
                    Ok(Value::Null)
                }
                Err(RecvTimeoutError::Disconnected) => Err(InterpreterError::host("async worker stopped unexpectedly")),
            },
            None => self
                .0
                .receiver
                .recv()
                .unwrap_or_else(|_| Err(InterpreterError::host("async worker stopped unexpectedly"))),
        };
        *outcome = Some(received.clone());
        received
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancel.is_cancelled()
    }

    pub fn ptr_eq(&self, other: &FutureHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FutureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureHandle")
            .field("resolved", &self.0.outcome.lock().is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
