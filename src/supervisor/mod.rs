pub(crate) mod builder;
pub(crate) mod handle;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    metrics::{Registration, StatusRegistry},
    policy::{RestartDecision, RestartPolicy},
    supervisor::handle::CompletionHandle,
    task::{run_guarded, DynTask, LiveState, Stats, TaskOutcome, TaskStatus},
    SupervisorError,
};

/// The run currently owned by the supervisor.
struct Run {
    /// Child of the cancellation source, cancelled to stop this run only.
    fuse: CancellationToken,
    done: CompletionHandle,
}

struct Slot {
    source: CancellationToken,
    run: Option<Run>,
    registration: Option<Registration>,
}

/// Keeps one worker alive according to a restart policy.
///
/// Each [`start`](Self::start) spawns a single control loop that invokes the
/// worker, contains its panics, and consults the [`RestartPolicy`] after
/// every termination. Counters are published as they change and can be read
/// through [`stats`](Self::stats) or exported with
/// [`with_exporter`](Self::with_exporter).
///
/// All methods take `&self`; wrap the supervisor in an `Arc` to drive it from
/// several tasks. The internal lock is never held while the worker runs.
pub struct Supervisor {
    name: String,
    worker: DynTask,
    policy: RestartPolicy,
    state: Arc<LiveState>,
    slot: Mutex<Slot>,
}

impl Supervisor {
    pub(crate) fn new(
        name: String,
        worker: DynTask,
        policy: RestartPolicy,
        source: CancellationToken,
    ) -> Self {
        Self {
            name,
            worker,
            policy,
            state: Arc::new(LiveState::default()),
            slot: Mutex::new(Slot {
                source,
                run: None,
                registration: None,
            }),
        }
    }

    /// Name used in log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Restart policy validated at build time.
    pub fn policy(&self) -> RestartPolicy {
        self.policy
    }

    /// Current status as last published by the control loop.
    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    /// Point-in-time copy of status, restart count and crash count.
    pub fn stats(&self) -> Stats {
        self.state.snapshot()
    }

    /// Returns `true` while a control loop is active.
    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .run
            .as_ref()
            .is_some_and(|run| !run.done.is_done())
    }

    /// Launches the control loop on the current Tokio runtime.
    ///
    /// Does nothing if a loop is already active. The new run gets a fresh
    /// child of the current cancellation source and a fresh completion signal.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(&self) -> &Self {
        let mut slot = self.slot.lock();
        if slot.run.as_ref().is_some_and(|run| !run.done.is_done()) {
            return self;
        }

        let fuse = slot.source.child_token();
        let done = CompletionHandle::pending();
        let control = ControlLoop {
            name: self.name.clone(),
            worker: self.worker.clone_box(),
            policy: self.policy,
            state: Arc::clone(&self.state),
            fuse: fuse.clone(),
        };
        let guard = done.token().clone().drop_guard();
        tokio::spawn(async move {
            let _guard = guard;
            control.run().await;
        });

        slot.run = Some(Run { fuse, done });
        self
    }

    /// Requests cancellation of the active run.
    ///
    /// Returns the run's completion handle; await it to know the loop has
    /// exited. Without an active run the handle is already closed.
    pub fn stop(&self) -> CompletionHandle {
        let slot = self.slot.lock();
        match &slot.run {
            Some(run) => {
                run.fuse.cancel();
                run.done.clone()
            }
            None => CompletionHandle::closed(),
        }
    }

    /// Completion handle of the current run, without requesting cancellation.
    pub fn wait(&self) -> CompletionHandle {
        self.slot
            .lock()
            .run
            .as_ref()
            .map_or_else(CompletionHandle::closed, |run| run.done.clone())
    }

    /// Replaces the cancellation source used by future runs.
    ///
    /// An active run is cancelled so it cannot keep going against the
    /// abandoned source. Await the returned handle before calling
    /// [`start`](Self::start) again: until the old loop has exited, `start`
    /// is a no-op.
    pub fn with_cancellation_source(&self, source: CancellationToken) -> CompletionHandle {
        let mut slot = self.slot.lock();
        slot.source = source;
        match &slot.run {
            Some(run) => {
                run.fuse.cancel();
                run.done.clone()
            }
            None => CompletionHandle::closed(),
        }
    }

    /// Exports this supervisor's counters under `label`.
    ///
    /// Labels must be unique within `registry`; a taken label fails with
    /// [`SupervisorError::DuplicateLabel`] and leaves the existing entry
    /// untouched. Registering again under a new label replaces the previous
    /// registration.
    pub fn with_exporter(
        &self,
        registry: &StatusRegistry,
        label: &str,
    ) -> Result<&Self, SupervisorError> {
        let registration = registry.register(label, Arc::clone(&self.state))?;
        tracing::debug!(worker = %self.name, label, "status exporter registered");
        let previous = self.slot.lock().registration.replace(registration);
        drop(previous);
        Ok(self)
    }

    /// Stops the active run, waits for it to exit and unregisters the exporter.
    ///
    /// Safe to call repeatedly and on a supervisor that was never started.
    pub async fn terminate(&self) {
        self.stop().await;
        let registration = self.slot.lock().registration.take();
        drop(registration);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if let Some(run) = slot.run.take() {
            run.fuse.cancel();
        }
    }
}

/// State moved into the spawned task for one run.
struct ControlLoop {
    name: String,
    worker: DynTask,
    policy: RestartPolicy,
    state: Arc<LiveState>,
    fuse: CancellationToken,
}

impl ControlLoop {
    async fn run(mut self) {
        tracing::info!(worker = %self.name, "supervisor started");

        loop {
            if self.fuse.is_cancelled() {
                self.state.mark(TaskStatus::Stopped);
                break;
            }

            self.execute().await;

            let restarts = self.state.snapshot().restarts;
            match self.policy.evaluate(restarts) {
                RestartDecision::Stop => {
                    tracing::debug!(worker = %self.name, restarts, "restart policy exhausted");
                    break;
                }
                RestartDecision::RestartNow => {
                    if self.fuse.is_cancelled() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                RestartDecision::RestartAfter(delay) => {
                    self.state.mark(TaskStatus::Waiting);
                    tracing::debug!(worker = %self.name, ?delay, "restart scheduled");
                    tokio::select! {
                        biased;
                        _ = self.fuse.cancelled() => {
                            self.state.mark(TaskStatus::Stopped);
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            self.state.record_restart();
        }

        tracing::info!(worker = %self.name, stats = ?self.state.snapshot(), "supervisor stopped");
    }

    /// Runs one invocation behind the fault boundary and records the outcome.
    async fn execute(&mut self) {
        self.state.mark(TaskStatus::Running);
        let mut task = self.worker.clone_box();

        match run_guarded(&mut task, self.fuse.clone()).await {
            TaskOutcome::Completed => {
                self.state.mark(TaskStatus::Stopped);
            }
            TaskOutcome::Failed(err) => {
                tracing::warn!(worker = %self.name, error = ?err, "worker returned an error");
                self.state.mark(TaskStatus::Stopped);
            }
            TaskOutcome::Crashed { message, backtrace } => {
                self.state.record_crash();
                tracing::error!(
                    worker = %self.name,
                    panic = %message,
                    backtrace = %backtrace,
                    "worker crashed"
                );
            }
        }
    }
}
