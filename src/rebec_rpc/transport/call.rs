//! The lifecycle of one in-flight unary call.
//!
//! A [`Call`] starts `Pending` and moves to exactly one terminal state. Whichever completion
//! gets there first (the response, an error, the deadline, or the caller dropping the future)
//! wins the compare-and-swap and runs the closer. Everything after that is a no-op, so the
//! session behind the call is closed once no matter how the races fall.

use crate::error::{Result, RpcError};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallState {
    Pending = 0,
    Succeeded = 1,
    Failed = 2,
    TimedOut = 3,
    Cancelled = 4,
}

impl CallState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CallState::Succeeded,
            2 => CallState::Failed,
            3 => CallState::TimedOut,
            4 => CallState::Cancelled,
            _ => CallState::Pending,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallState::Pending => "pending",
            CallState::Succeeded => "succeeded",
            CallState::Failed => "failed",
            CallState::TimedOut => "timed-out",
            CallState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

type Closer = Box<dyn FnOnce() + Send>;

pub struct Call {
    path: String,
    state: AtomicU8,
    closer: Mutex<Option<Closer>>,
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

impl Call {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: AtomicU8::new(CallState::Pending as u8),
            closer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> CallState {
        CallState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Registers what closing the call means. If the call already finished, closes right away.
    pub fn attach<F>(&self, closer: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.closer.lock().unwrap_or_else(|e| e.into_inner());
        if self.state() == CallState::Pending {
            *slot = Some(Box::new(closer));
        } else {
            drop(slot);
            closer();
        }
    }

    /// Moves the call into `state` if it is still pending. Returns whether this completion won.
    pub fn finish(&self, state: CallState) -> bool {
        let won = self
            .state
            .compare_exchange(
                CallState::Pending as u8,
                state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            debug!(path = %self.path, %state, "call finished");
            let closer = self
                .closer
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            if let Some(close) = closer {
                trace!(path = %self.path, "closing session");
                close();
            }
        }
        won
    }

    /// Runs `exchange` under an optional deadline and records how it ended.
    pub async fn drive<T, F>(&self, timeout: Option<Duration>, exchange: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.finish(CallState::TimedOut);
                    return Err(RpcError::Timeout(limit));
                }
            },
            None => exchange.await,
        };
        match &outcome {
            Ok(_) => self.finish(CallState::Succeeded),
            Err(_) => self.finish(CallState::Failed),
        };
        outcome
    }
}

impl Drop for Call {
    fn drop(&mut self) {
        self.finish(CallState::Cancelled);
    }
}
