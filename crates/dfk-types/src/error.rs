// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::record::TaskId;

/// Bad configuration shape at `Config`/`DataFlowKernel` construction time
/// (spec §7). Also used for caller-usage errors that are not part of the
/// task-lifecycle taxonomy, such as calling `cleanup()` twice.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ConfigurationError {
    #[error("no executors configured")]
    NoExecutors,

    #[error("checkpoint_period {raw:?} is not a valid HH:MM:SS period")]
    InvalidCheckpointPeriod { raw: String },

    #[error("run_dir {path} could not be created: {reason}")]
    RunDirUnavailable { path: String, reason: String },

    #[error("cleanup() has already been called on this kernel")]
    AlreadyCleanedUp,

    #[error("no configured executor matches the requested executor selection")]
    NoExecutorsMatchSelection,
}

/// Internal consistency breach: a task id collision in the registry (spec
/// §4.2, §7).
#[derive(Debug, thiserror::Error, Clone)]
#[error("task {0} already exists in the task registry")]
pub struct DuplicateTaskError(pub TaskId);

/// One or more input futures of a task terminated in failure (spec §7).
///
/// `causes` holds the underlying errors from the failed dependencies, and
/// `task_id` names the dependent task whose `AppFuture` this error surfaces
/// on. Dependency errors are never retried: a task that observes this error
/// transitions directly to `Status::DepFail`, a terminal state.
#[derive(Debug, Clone)]
pub struct DependencyError {
    pub causes: Vec<Arc<TaskError>>,
    pub task_id: TaskId,
}

impl std::fmt::Display for DependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "task {} failed because {} dependenc{} failed: ",
            self.task_id,
            self.causes.len(),
            if self.causes.len() == 1 { "y" } else { "ies" }
        )?;
        for (i, cause) in self.causes.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DependencyError {}

/// An executor future that completed *successfully* at the transport level
/// but carries a captured remote error inside its payload (spec §7: "an
/// executor future completes successfully but carries a captured remote
/// error; the completion handler unwraps and treats as failure"). The
/// completion handler recognizes this shape in a task's result value and
/// converts it into a failure before applying the retry/fail decision,
/// exactly as it would an `Err` returned directly from the executor.
#[derive(Debug, thiserror::Error, Clone)]
#[error("remote task raised: {0}")]
pub struct RemoteExceptionWrapper(pub String);

/// Checkpoint directory missing, unreadable, or structurally invalid (spec
/// §7, §4.8).
#[derive(Debug, thiserror::Error, Clone)]
pub enum BadCheckpoint {
    #[error("checkpoint directory {0} does not contain a tasks.log")]
    MissingLog(String),

    #[error("checkpoint directory {0} could not be read: {1}")]
    Unreadable(String, String),

    #[error("checkpoint record in {0} is structurally invalid: {1}")]
    Corrupt(String, String),
}

/// The terminal error surfaced by a task's `AppFuture`: either the task's
/// own execution failure (including an unwrapped `RemoteExceptionWrapper`),
/// or a `DependencyError` propagated from an upstream failure.
#[derive(Debug, thiserror::Error, Clone)]
pub enum TaskError {
    #[error("task execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Dependency(#[from] DependencyErrorBox),

    #[error(transparent)]
    Remote(#[from] RemoteExceptionWrapper),
}

/// Newtype so `DependencyError` (which is not itself `std::error::Error`-free
/// of a `Clone` bound issue) can participate in `#[from]` wiring cleanly.
#[derive(Debug, Clone)]
pub struct DependencyErrorBox(pub Arc<DependencyError>);

impl std::fmt::Display for DependencyErrorBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DependencyErrorBox {}

impl From<DependencyError> for TaskError {
    fn from(e: DependencyError) -> Self {
        TaskError::Dependency(DependencyErrorBox(Arc::new(e)))
    }
}

impl TaskError {
    /// Returns the underlying `DependencyError`, if this is one (spec §8
    /// scenario 3: callers inspect `.causes`/`.task_id` on a dependent's
    /// terminal error).
    pub fn as_dependency_error(&self) -> Option<&Arc<DependencyError>> {
        match self {
            TaskError::Dependency(boxed) => Some(&boxed.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_error_display_names_task_and_causes() {
        let cause = Arc::new(TaskError::Execution("boom".into()));
        let err = DependencyError {
            causes: vec![cause],
            task_id: TaskId(7),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("task 7"));
        assert!(rendered.contains("boom"));
    }
}
