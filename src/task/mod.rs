use std::{
    any::Any,
    backtrace::Backtrace,
    cell::{Cell, RefCell},
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Once,
    },
    task::Poll,
};

use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{TaskError, TaskResult};

/// The trait users implement for work managed by a [`Supervisor`](crate::Supervisor).
///
/// # Clone and restart semantics
///
/// The supervisor stores the **original** instance and clones it for each
/// invocation. Mutations via `&mut self` only live in the clone and are lost
/// on restart. Shared state (`Arc<...>`) survives because `Clone` just bumps
/// the refcount.
///
/// # Cancellation
///
/// The token is cancelled when the supervisor is stopped or its cancellation
/// source fires. Observing it is the worker's job: a worker that never looks
/// at the token keeps `stop` and `terminate` waiting.
///
/// # Example
///
/// ```rust
/// use task_warden::{TaskResult, Worker};
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Clone)]
/// struct Ticker;
///
/// impl Worker for Ticker {
///     async fn run(&mut self, token: CancellationToken) -> TaskResult {
///         token.cancelled().await;
///         Ok(())
///     }
/// }
/// ```
pub trait Worker: Clone + Send + Sync + 'static {
    /// Runs one invocation of the worker.
    ///
    /// Returning, with `Ok` or `Err`, is a normal termination. Panicking is a
    /// crash: it is caught by the supervisor and counted.
    fn run(&mut self, token: CancellationToken) -> impl Future<Output = TaskResult> + Send;
}

/// Dyn-compatible wrapper for `Worker`. Not user-facing.
pub(crate) trait DynWorker: Send + Sync + 'static {
    fn run_boxed(
        &mut self,
        token: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>>;
    fn clone_box(&self) -> Box<dyn DynWorker>;
}

impl<T: Worker> DynWorker for T {
    fn run_boxed(
        &mut self,
        token: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>> {
        Box::pin(self.run(token))
    }

    fn clone_box(&self) -> Box<dyn DynWorker> {
        Box::new(self.clone())
    }
}

pub(crate) type DynTask = Box<dyn DynWorker>;

/// Closure-backed worker.
///
/// The closure creates a fresh future per invocation.
///
/// ```rust
/// use task_warden::{TaskError, WorkerFn};
/// use tokio_util::sync::CancellationToken;
///
/// let worker = WorkerFn::new(|token: CancellationToken| async move {
///     token.cancelled().await;
///     Ok::<_, TaskError>(())
/// });
/// # let _ = worker;
/// ```
#[derive(Clone)]
pub struct WorkerFn<F> {
    f: F,
}

impl<F> WorkerFn<F> {
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Worker for WorkerFn<F>
where
    F: Fn(CancellationToken) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    fn run(&mut self, token: CancellationToken) -> impl Future<Output = TaskResult> + Send {
        (self.f)(token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TaskStatus {
    Stopped = 0,
    Running = 1,
    Waiting = 2,
    Crashed = 3,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Stopped,
        TaskStatus::Running,
        TaskStatus::Waiting,
        TaskStatus::Crashed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Crashed => "crashed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, TaskStatus::Waiting)
    }

    pub fn has_crashed(&self) -> bool {
        matches!(self, TaskStatus::Crashed)
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Waiting,
            3 => Self::Crashed,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a supervisor's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub restarts: u64,
    pub crashes: u64,
    pub status: TaskStatus,
}

/// Counters written by the control loop and read by anyone.
///
/// There is no invariant across the three fields, so each one is an
/// independent atomic.
#[derive(Debug, Default)]
pub(crate) struct LiveState {
    status: AtomicU8,
    restarts: AtomicU64,
    crashes: AtomicU64,
}

impl LiveState {
    pub(crate) fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn mark(&self, status: TaskStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub(crate) fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_crash(&self) {
        self.crashes.fetch_add(1, Ordering::AcqRel);
        self.mark(TaskStatus::Crashed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            restarts: self.restarts.load(Ordering::Acquire),
            crashes: self.crashes.load(Ordering::Acquire),
            status: self.status(),
        }
    }
}

/// How one worker invocation ended.
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Completed,
    Failed(TaskError),
    Crashed {
        message: String,
        /// Stack of the panicking frame, captured before unwinding.
        backtrace: Backtrace,
    },
}

thread_local! {
    /// Number of guarded polls on the stack of this thread.
    static GUARD_DEPTH: Cell<u32> = const { Cell::new(0) };
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Chains a panic hook that records the backtrace of panics raised inside a
/// guarded poll. Other panics go straight to the previous hook.
fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) > 0 {
                let trace = Backtrace::force_capture();
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// Marks the current thread as polling a guarded worker.
struct GuardedPoll;

impl GuardedPoll {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for GuardedPoll {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Fault boundary: runs a single invocation and turns a panic into
/// [`TaskOutcome::Crashed`].
///
/// The panic is raised and caught within the same poll, so the trace the
/// hook stored on this thread belongs to it.
pub(crate) async fn run_guarded(task: &mut DynTask, token: CancellationToken) -> TaskOutcome {
    install_trace_hook();
    let mut invocation = AssertUnwindSafe(task.run_boxed(token)).catch_unwind();
    let result = futures::future::poll_fn(|cx| {
        let _guarded = GuardedPoll::enter();
        let poll = invocation.poll_unpin(cx);
        if !matches!(poll, Poll::Ready(Err(_))) {
            // Nothing escaped this poll; drop any trace left over from a
            // panic the worker caught on its own.
            PANIC_TRACE.with(|slot| slot.borrow_mut().take());
        }
        poll
    })
    .await;

    match result {
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(err)) => TaskOutcome::Failed(err),
        Err(payload) => TaskOutcome::Crashed {
            message: panic_message(payload.as_ref()),
            // Missing only when a later hook replaced ours.
            backtrace: PANIC_TRACE
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_else(Backtrace::force_capture),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
