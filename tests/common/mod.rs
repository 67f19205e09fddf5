use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use task_warden::{Supervisor, SupervisorBuilder, TaskResult, Worker};
use tokio_util::sync::CancellationToken;

/// Returns as soon as it starts.
#[derive(Clone, Default)]
pub struct CountingTask {
    pub run_count: Arc<AtomicUsize>,
}

impl CountingTask {
    #[allow(unused)]
    pub fn runs(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }
}

impl Worker for CountingTask {
    async fn run(&mut self, _token: CancellationToken) -> TaskResult {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Panics on every invocation.
#[derive(Clone, Default)]
pub struct PanickingTask {
    pub run_count: Arc<AtomicUsize>,
}

impl PanickingTask {
    #[allow(unused)]
    pub fn runs(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }
}

impl Worker for PanickingTask {
    async fn run(&mut self, _token: CancellationToken) -> TaskResult {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        panic!("panic!");
    }
}

/// Returns an error on every invocation.
#[derive(Clone, Default)]
pub struct FailingTask {
    pub run_count: Arc<AtomicUsize>,
}

impl FailingTask {
    #[allow(unused)]
    pub fn runs(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }
}

impl Worker for FailingTask {
    async fn run(&mut self, _token: CancellationToken) -> TaskResult {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("task failed"))
    }
}

/// Runs until cancelled, or for ten seconds at most.
#[derive(Clone, Default)]
pub struct BlockingTask {
    pub run_count: Arc<AtomicUsize>,
}

impl BlockingTask {
    #[allow(unused)]
    pub fn runs(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }
}

impl Worker for BlockingTask {
    async fn run(&mut self, token: CancellationToken) -> TaskResult {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(10)) => {}
        }
        Ok(())
    }
}

/// Builds a supervisor with the given restart settings.
#[allow(unused)]
pub fn supervise(
    worker: impl Worker,
    restarts: i32,
    delay: Duration,
    source: CancellationToken,
) -> Supervisor {
    SupervisorBuilder::new(worker)
        .with_name("test")
        .with_max_restarts(restarts)
        .with_restart_delay(delay)
        .with_cancellation_source(source)
        .build()
        .unwrap()
}
