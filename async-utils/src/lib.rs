//! Cooperative cancellation helpers shared by the fetch layer.
//!
//! - [`OrCancelExt`] races any future against a [`CancellationToken`].
//! - [`CancelSlot`] tracks the token of the single in-flight operation of a
//!   logical slot; arming a new operation cancels the previous one.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::sync::PoisonError;

pub use tokio_util::sync::CancellationToken;

/// Returned when the token fired before the future settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Extension trait for making futures cancellable.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Race this future against `token`.
    ///
    /// A token that is already cancelled wins without polling the future.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}

/// Token handed out by [`CancelSlot::arm`].
#[derive(Debug, Clone)]
pub struct ArmedToken {
    generation: u64,
    token: CancellationToken,
}

impl ArmedToken {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    armed: Option<CancellationToken>,
}

/// Holds the cancellation token of the operation currently owning a slot.
///
/// `arm` hands out a fresh token and cancels whatever was armed before, so at
/// most one operation per slot is ever live on the wire.
#[derive(Debug, Default)]
pub struct CancelSlot {
    state: Mutex<SlotState>,
}

impl CancelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the previous operation (if any) and arm a new token.
    pub fn arm(&self) -> ArmedToken {
        let token = CancellationToken::new();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        if let Some(previous) = state.armed.replace(token.clone()) {
            previous.cancel();
        }
        ArmedToken {
            generation: state.generation,
            token,
        }
    }

    /// Cancel the armed operation, leaving the slot empty.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = state.armed.take() {
            previous.cancel();
        }
    }

    /// Release the slot if `armed` is still the current operation.
    ///
    /// A settled operation calls this so it no longer counts as in flight;
    /// a superseded one is a no-op.
    pub fn release(&self, armed: &ArmedToken) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == armed.generation {
            state.armed = None;
        }
    }

    /// Whether an operation is currently armed.
    pub fn is_armed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .armed
            .is_some()
    }
}
