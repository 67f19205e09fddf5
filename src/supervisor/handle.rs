use std::future::IntoFuture;

use tokio_util::sync::{
    CancellationToken, WaitForCancellationFuture, WaitForCancellationFutureOwned,
};

/// One-shot signal closed when a control loop run has fully exited.
///
/// Every [`Supervisor::start`](crate::Supervisor::start) allocates a new
/// signal, so a handle obtained for one run never reports on another.
/// Handles are cheap to clone and can be awaited any number of times.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    done: CancellationToken,
}

impl CompletionHandle {
    /// Signal for a run that is about to be launched.
    pub(crate) fn pending() -> Self {
        Self {
            done: CancellationToken::new(),
        }
    }

    /// Signal for a supervisor that has nothing running.
    pub(crate) fn closed() -> Self {
        let done = CancellationToken::new();
        done.cancel();
        Self { done }
    }

    /// Token the control loop cancels on exit.
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.done
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Resolves once the run has exited. Resolves immediately if it already has.
    pub fn wait(&self) -> WaitForCancellationFuture<'_> {
        self.done.cancelled()
    }
}

impl IntoFuture for CompletionHandle {
    type Output = ();
    type IntoFuture = WaitForCancellationFutureOwned;

    fn into_future(self) -> Self::IntoFuture {
        self.done.cancelled_owned()
    }
}
