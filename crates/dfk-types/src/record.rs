// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::Status;

/// A task's monotonic id, dense and strictly increasing from zero within a
/// run (spec §3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A deterministic fingerprint of a task's identity and resolved inputs,
/// used as the memo-table key (spec §3, §4.7). Derived from `func_name`,
/// the optional user-supplied `fn_hash`, and the resolved args/kwargs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable point-in-time summary of a task record, used by monitoring
/// emits and `log_task_states` (spec §4.6 "Emit monitoring record",
/// §5 "Shutdown"). This is the Rust analogue of the original's
/// `_create_task_log_info` dictionary: a flat, serializable record, not the
/// live mutable task itself (which also holds the callable and the futures
/// and lives in `dfk::registry::TaskRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub func_name: String,
    pub fn_hash: Option<String>,
    pub memoize: bool,
    pub status: Status,
    pub executor: String,
    pub fail_count: u32,
    pub depends: Vec<TaskId>,
    pub time_submitted: Option<DateTime<Utc>>,
    pub time_returned: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    /// Elapsed wall time between submission and return, if both are known.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.time_submitted, self.time_returned) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
