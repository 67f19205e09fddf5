//! # Status exporter
//!
//! Read-only view of supervisor counters for a pull-based metrics system.
//!
//! A [`StatusRegistry`] is owned by the host program. Supervisors register
//! under a caller-chosen label and keep only the returned [`Registration`];
//! dropping it removes the entry. [`StatusRegistry::render`] produces the
//! Prometheus text exposition format, ready to be served from a scrape
//! endpoint:
//!
//! ```text
//! # HELP task_warden_workers_restarts The number of worker restarts
//! # TYPE task_warden_workers_restarts counter
//! task_warden_workers_restarts{worker="http_server"} 3
//! # HELP task_warden_workers_crashes The number of worker crashes
//! # TYPE task_warden_workers_crashes counter
//! task_warden_workers_crashes{worker="http_server"} 1
//! # HELP task_warden_workers_status Worker status
//! # TYPE task_warden_workers_status gauge
//! task_warden_workers_status{worker="http_server",status="stopped"} 0
//! task_warden_workers_status{worker="http_server",status="running"} 1
//! task_warden_workers_status{worker="http_server",status="waiting"} 0
//! task_warden_workers_status{worker="http_server",status="crashed"} 0
//! ```
//!
//! Each counter is read atomically on its own; the three series are not a
//! consistent snapshot of each other.

use std::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::{
    task::{LiveState, Stats, TaskStatus},
    SupervisorError,
};

const DEFAULT_NAMESPACE: &str = "task_warden";
const SUBSYSTEM: &str = "workers";
const LABEL_KEY: &str = "worker";

type Entries = Mutex<BTreeMap<String, Arc<LiveState>>>;

/// Registry of exported supervisors, keyed by label.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Debug, Clone)]
pub struct StatusRegistry {
    namespace: String,
    entries: Arc<Entries>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            entries: Arc::default(),
        }
    }

    /// Sets the prefix of every metric name.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub(crate) fn register(
        &self,
        label: &str,
        state: Arc<LiveState>,
    ) -> Result<Registration, SupervisorError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(label) {
            return Err(SupervisorError::DuplicateLabel {
                label: label.to_string(),
            });
        }
        entries.insert(label.to_string(), state);
        Ok(Registration {
            label: label.to_string(),
            entries: Arc::downgrade(&self.entries),
        })
    }

    pub fn is_registered(&self, label: &str) -> bool {
        self.entries.lock().contains_key(label)
    }

    /// Registered labels in sorted order.
    pub fn labels(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Current counters of the supervisor exported under `label`.
    pub fn snapshot(&self, label: &str) -> Option<Stats> {
        self.entries.lock().get(label).map(|state| state.snapshot())
    }

    /// Renders every registered supervisor in Prometheus text format.
    pub fn render(&self) -> String {
        let samples: Vec<(String, Stats)> = self
            .entries
            .lock()
            .iter()
            .map(|(label, state)| (escape_label_value(label), state.snapshot()))
            .collect();

        let prefix = format!("{}_{}", self.namespace, SUBSYSTEM);
        let mut out = String::new();

        out.push_str(&format!(
            "# HELP {prefix}_restarts The number of worker restarts\n\
             # TYPE {prefix}_restarts counter\n"
        ));
        for (label, stats) in &samples {
            let restarts = stats.restarts;
            out.push_str(&format!(
                "{prefix}_restarts{{{LABEL_KEY}=\"{label}\"}} {restarts}\n"
            ));
        }

        out.push_str(&format!(
            "# HELP {prefix}_crashes The number of worker crashes\n\
             # TYPE {prefix}_crashes counter\n"
        ));
        for (label, stats) in &samples {
            let crashes = stats.crashes;
            out.push_str(&format!(
                "{prefix}_crashes{{{LABEL_KEY}=\"{label}\"}} {crashes}\n"
            ));
        }

        out.push_str(&format!(
            "# HELP {prefix}_status Worker status\n\
             # TYPE {prefix}_status gauge\n"
        ));
        for (label, stats) in &samples {
            for status in TaskStatus::ALL {
                let value = u8::from(status == stats.status);
                out.push_str(&format!(
                    "{prefix}_status{{{LABEL_KEY}=\"{label}\",status=\"{status}\"}} {value}\n"
                ));
            }
        }

        out
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of registration. Unregisters on drop.
#[derive(Debug)]
#[must_use = "dropping a Registration unregisters it"]
pub struct Registration {
    label: String,
    entries: Weak<Entries>,
}

impl Registration {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Removes the entry from the registry now.
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries.lock().remove(&self.label);
        }
    }
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
