// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// A task's position in the lifecycle state machine (spec §4.4).
///
/// ```text
/// unsched ──submit────▶ pending
/// pending ──launch────▶ launched
/// pending ──dep-err───▶ dep_fail          (terminal)
/// launched ──ok───────▶ done              (terminal)
/// launched ──fail─────▶ pending           (if fail_count <= retries and lazy_errors)
/// launched ──fail─────▶ failed            (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Unsched,
    Pending,
    Launched,
    Done,
    Failed,
    DepFail,
}

impl Status {
    /// Whether this status is terminal: the task will never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::DepFail)
    }

    /// Whether this status is a terminal *failure* (used when deciding
    /// whether a dependent future's error should be folded into a
    /// `DependencyError`).
    pub fn is_final_failure(self) -> bool {
        matches!(self, Status::Failed | Status::DepFail)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Unsched => "unsched",
            Status::Pending => "pending",
            Status::Launched => "launched",
            Status::Done => "done",
            Status::Failed => "failed",
            Status::DepFail => "dep_fail",
        };
        f.write_str(s)
    }
}

/// Convenience slice of every terminal status, mirroring the original's
/// `FINAL_STATES` in `parsl.dataflow.states`.
pub const FINAL_STATES: &[Status] = &[Status::Done, Status::Failed, Status::DepFail];

/// Convenience slice of the terminal *failure* statuses, mirroring the
/// original's `FINAL_FAILURE_STATES`.
pub const FINAL_FAILURE_STATES: &[Status] = &[Status::Failed, Status::DepFail];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_classification() {
        assert!(!Status::Unsched.is_terminal());
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Launched.is_terminal());
        assert!(Status::Done.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(Status::DepFail.is_terminal());
    }

    #[test]
    fn final_failure_classification() {
        assert!(!Status::Done.is_final_failure());
        assert!(Status::Failed.is_final_failure());
        assert!(Status::DepFail.is_final_failure());
    }
}
