//! # task-warden
//!
//! `task-warden` keeps one long-running Tokio worker alive.
//! It restarts the worker when it returns or panics, contains the panic so
//! the host process keeps going, and publishes live counters (status,
//! restarts, crashes) for metrics scraping.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use task_warden::{StatusRegistry, SupervisorBuilder, TaskError, WorkerFn};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = StatusRegistry::new();
//!     let worker = WorkerFn::new(|token: CancellationToken| async move {
//!         token.cancelled().await;
//!         Ok::<_, TaskError>(())
//!     });
//!
//!     let supervisor = SupervisorBuilder::new(worker)
//!         .with_max_restarts(-1)
//!         .with_restart_delay(Duration::from_secs(1))
//!         .with_cancellation_source(task_warden::signals::shutdown_token())
//!         .build()?;
//!     supervisor.with_exporter(&registry, "ticker")?.start();
//!
//!     supervisor.wait().await; // until a termination signal arrives
//!     supervisor.terminate().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Restart policy
//!
//! | `restart` | Behavior                                   |
//! | --------- | ------------------------------------------ |
//! | `-1`      | restart forever                            |
//! | `0`       | run once                                   |
//! | `n`       | run, then restart up to `n` times          |
//!
//! Returns and panics are treated alike by the policy. A non-zero
//! `restart_delay` puts the supervisor in the `waiting` state between runs;
//! cancellation during that wait ends the run without another restart.
//!
//! ## Lifecycle
//!
//! | Supervisor method                    | Purpose                                            |
//! | ------------------------------------ | -------------------------------------------------- |
//! | `start()`                            | Launch the control loop (no-op if already active)  |
//! | `stop()`                             | Cancel the active run, return its completion handle |
//! | `wait()`                             | Completion handle of the current run               |
//! | `with_cancellation_source(token)`    | Swap the source, cancelling the active run         |
//! | `with_exporter(&registry, label)`    | Export counters under a unique label               |
//! | `terminate().await`                  | Stop, wait, unregister                             |

pub use config::SupervisorConfig;
pub use error::{SupervisorError, TaskError, TaskResult};
pub use metrics::{Registration, StatusRegistry};
pub use policy::{MaxRestarts, RestartDecision, RestartPolicy};
pub use supervisor::{builder::SupervisorBuilder, handle::CompletionHandle, Supervisor};
pub use task::{Stats, TaskStatus, Worker, WorkerFn};

mod config;
mod error;
mod metrics;
mod policy;
pub mod signals;
mod supervisor;
mod task;
