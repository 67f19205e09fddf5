mod common;

use std::time::Duration;

use task_warden::TaskStatus;
use tokio::time::pause;
use tokio_util::sync::CancellationToken;

use common::{supervise, CountingTask, FailingTask, PanickingTask};

#[tokio::test]
async fn test_run_once() {
    pause();
    let task = CountingTask::default();
    let supervisor = supervise(task.clone(), 0, Duration::ZERO, CancellationToken::new());

    supervisor.start().wait().await;

    assert_eq!(task.runs(), 1);
    let stats = supervisor.stats();
    assert_eq!(stats.restarts, 0);
    assert_eq!(stats.crashes, 0);
    assert_eq!(stats.status, TaskStatus::Stopped);
    assert!(!supervisor.is_active());
}

#[tokio::test]
async fn test_run_n_times() {
    pause();
    let n = 4;
    let task = CountingTask::default();
    let supervisor = supervise(task.clone(), n, Duration::ZERO, CancellationToken::new());

    supervisor.start().wait().await;

    assert_eq!(task.runs(), n as usize + 1);
    assert_eq!(supervisor.stats().restarts, n as u64);
}

#[tokio::test]
async fn test_run_n_times_with_delay() {
    pause();
    let task = CountingTask::default();
    let supervisor = supervise(
        task.clone(),
        2,
        Duration::from_millis(100),
        CancellationToken::new(),
    );

    let started = tokio::time::Instant::now();
    supervisor.start().wait().await;

    assert_eq!(task.runs(), 3);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(supervisor.status(), TaskStatus::Stopped);
}

#[tokio::test]
async fn test_run_infinite() {
    pause();
    let source = CancellationToken::new();
    let task = CountingTask::default();
    let supervisor = supervise(
        task.clone(),
        -1,
        Duration::from_millis(100),
        source.clone(),
    );

    let timeout = source.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        timeout.cancel();
    });

    supervisor.start().wait().await;

    let runs = task.runs();
    assert!(runs > 2, "worker ran {runs} times");
    assert_eq!(supervisor.stats().restarts, runs as u64 - 1);
}

#[tokio::test]
async fn test_panicking_worker_is_restarted() {
    pause();
    let task = PanickingTask::default();
    let supervisor = supervise(
        task.clone(),
        1,
        Duration::from_millis(100),
        CancellationToken::new(),
    );

    supervisor.start().wait().await;

    assert_eq!(task.runs(), 2);
    let stats = supervisor.stats();
    assert_eq!(stats.crashes, 2);
    assert_eq!(stats.restarts, 1);
    assert_eq!(stats.status, TaskStatus::Crashed);
}

#[tokio::test]
async fn test_panic_with_run_once() {
    pause();
    let task = PanickingTask::default();
    let supervisor = supervise(task.clone(), 0, Duration::ZERO, CancellationToken::new());

    supervisor.start().wait().await;

    assert_eq!(task.runs(), 1);
    assert_eq!(supervisor.stats().crashes, 1);
}

#[tokio::test]
async fn test_error_return_is_not_a_crash() {
    pause();
    let task = FailingTask::default();
    let supervisor = supervise(task.clone(), 2, Duration::ZERO, CancellationToken::new());

    supervisor.start().wait().await;

    assert_eq!(task.runs(), 3);
    let stats = supervisor.stats();
    assert_eq!(stats.crashes, 0);
    assert_eq!(stats.restarts, 2);
    assert_eq!(stats.status, TaskStatus::Stopped);
}

#[tokio::test]
async fn test_restart_budget_spans_runs() {
    pause();
    let task = CountingTask::default();
    let supervisor = supervise(task.clone(), 1, Duration::ZERO, CancellationToken::new());

    supervisor.start().wait().await;
    assert_eq!(task.runs(), 2);
    assert_eq!(supervisor.stats().restarts, 1);

    // The single restart was spent by the first run.
    supervisor.start().wait().await;
    assert_eq!(task.runs(), 3);
    assert_eq!(supervisor.stats().restarts, 1);
    assert_eq!(supervisor.status(), TaskStatus::Stopped);
}
