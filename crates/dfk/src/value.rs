// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use dfk_types::TaskId;

/// The task-result value type this kernel is instantiated over (spec §2,
/// GLOSSARY). A concrete JSON value rather than a boxed `dyn Any`: apps are
/// dynamically typed at the submission boundary (closures captured at
/// `submit` time), and `serde_json::Value` is also what the checkpoint log
/// and memo table already serialize task results as (spec §3, §4.8).
pub type Value = serde_json::Value;

/// One positional/keyword argument slot to a submitted app (spec §3
/// `TaskRecord.args`/`kwargs`: "possibly containing futures and remote file
/// handles").
#[derive(Debug, Clone)]
pub enum Arg {
    /// A resolved, non-future value, passed through verbatim (spec §3
    /// invariants: "every non-future argument is passed through
    /// verbatim").
    Value(Value),
    /// A dependency on another task's result, identified by that task's id
    /// (spec §3 `depends`). Replaced with the resolved `Value` by
    /// `sanitize_and_wrap` once the referenced task reaches a terminal
    /// state (spec §4.3).
    Dep(TaskId),
    /// A handle to a possibly-remote file (spec §6 staging interface,
    /// GLOSSARY). Converted to `Arg::Dep` by `add_input_deps` when remote,
    /// left as-is (the staging provider reports `is_remote() == false`)
    /// otherwise.
    RemoteFile(RemoteFile),
}

impl Arg {
    pub fn dep(&self) -> Option<TaskId> {
        match self {
            Arg::Dep(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

/// A handle to a file that may need staging in/out of an executor before a
/// task can use it (spec §6 "Staging interface (consumed)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    pub remote: bool,
}

impl RemoteFile {
    pub fn local(path: impl Into<String>) -> Self {
        RemoteFile { path: path.into(), remote: false }
    }

    pub fn remote(path: impl Into<String>) -> Self {
        RemoteFile { path: path.into(), remote: true }
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }
}

/// Which executor(s) a submission is eligible to run on (spec §4.5
/// "Executor selection at submit time"): either every non-staging executor
/// configured on the kernel, or a caller-supplied list of labels. Resolved
/// to a single concrete label by [`crate::launcher::Launcher::select_executor`]
/// at submit time, uniformly at random; the choice is then fixed for the
/// task's lifetime, including retries.
#[derive(Debug, Clone)]
pub enum ExecutorSelection {
    /// Choose uniformly at random from every configured executor other
    /// than the staging executor (spec §4.5 "if the user requested
    /// `'all'`...", GLOSSARY "Staging executor: ... never selected for
    /// user apps").
    All,
    /// Choose uniformly at random from this caller-supplied list (spec
    /// §4.5 "if the user supplied a list of labels...").
    Labels(Vec<String>),
}

impl From<&str> for ExecutorSelection {
    /// Mirrors the original's single keyword argument doing double duty as
    /// either the literal string `"all"` or one executor label (spec §6
    /// `executors='all'|[labels]`).
    fn from(label: &str) -> Self {
        if label == "all" {
            ExecutorSelection::All
        } else {
            ExecutorSelection::Labels(vec![label.to_string()])
        }
    }
}

impl From<String> for ExecutorSelection {
    fn from(label: String) -> Self {
        ExecutorSelection::from(label.as_str())
    }
}

impl From<Vec<String>> for ExecutorSelection {
    fn from(labels: Vec<String>) -> Self {
        ExecutorSelection::Labels(labels)
    }
}

impl<'a> From<Vec<&'a str>> for ExecutorSelection {
    fn from(labels: Vec<&'a str>) -> Self {
        ExecutorSelection::Labels(labels.into_iter().map(str::to_string).collect())
    }
}

/// The staging collaborator (spec §4.3 "A separate pre-submit step,
/// `add_input_deps`..."; spec §6 "Staging interface (consumed)"). Consumed
/// only through this contract; `dfk` has no opinion on how a concrete
/// provider (local disk, HTTP, Globus, ...) moves bytes.
///
/// The label returned by [`StagingProvider::staging_executor_label`] is
/// reserved: `add_input_deps` never stages a file when the target executor
/// *is* the staging executor (spec §4.3 "Staging is skipped when the target
/// executor is the staging executor itself"), and the launcher never
/// selects it for a user app's `'all'`/executor-list resolution (spec §4.5,
/// GLOSSARY "Staging executor").
pub trait StagingProvider: Send + Sync {
    fn staging_executor_label(&self) -> &str;

    /// Issues an input-stage request for `file` onto `executor_label`, to
    /// be awaited by the task's dependency resolver like any other future
    /// (spec §4.3, §6 `File.stage_in`).
    fn stage_in(&self, file: &RemoteFile, executor_label: &str) -> dfk_future::Future<Value>;

    /// Issues an output-stage request for `file` on `executor_label`; fire
    /// and forget from the kernel's point of view (spec §4.6, §9 Open
    /// Question (b): output futures are siblings the caller awaits
    /// explicitly, not something `result()` blocks on).
    fn stage_out(&self, file: &RemoteFile, executor_label: &str) -> dfk_future::Future<Value>;
}

/// A `StagingProvider` that treats every file as already local: `stage_in`
/// and `stage_out` resolve immediately with the file's path. Used when a
/// `Config` has no remote staging configured.
#[derive(Debug, Default)]
pub struct NoopStaging;

impl StagingProvider for NoopStaging {
    fn staging_executor_label(&self) -> &str {
        "_dfk_staging"
    }

    fn stage_in(&self, file: &RemoteFile, _executor_label: &str) -> dfk_future::Future<Value> {
        let fut = dfk_future::Future::new();
        let _ = fut.set_result(Value::String(file.path.clone()));
        fut
    }

    fn stage_out(&self, file: &RemoteFile, _executor_label: &str) -> dfk_future::Future<Value> {
        let fut = dfk_future::Future::new();
        let _ = fut.set_result(Value::String(file.path.clone()));
        fut
    }
}

/// Detects the original's `RemoteExceptionWrapper` convention in a
/// successful result value (spec §7): a task's function may return a
/// sentinel object shaped `{"__dfk_remote_exception__": "<message>"}` to
/// signal that it completed at the transport level but is reporting a
/// captured remote failure. The completion handler checks every successful
/// result for this shape before marking a task `done`.
pub fn as_remote_exception(value: &Value) -> Option<dfk_types::RemoteExceptionWrapper> {
    value
        .as_object()
        .and_then(|obj| obj.get("__dfk_remote_exception__"))
        .and_then(|v| v.as_str())
        .map(|msg| dfk_types::RemoteExceptionWrapper(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_values_are_not_remote_exceptions() {
        assert!(as_remote_exception(&serde_json::json!({"x": 1})).is_none());
    }

    #[test]
    fn sentinel_object_is_detected() {
        let v = serde_json::json!({"__dfk_remote_exception__": "boom"});
        let wrapped = as_remote_exception(&v).expect("should detect");
        assert_eq!(wrapped.0, "boom");
    }

    #[test]
    fn the_literal_all_string_selects_every_executor() {
        assert!(matches!(ExecutorSelection::from("all"), ExecutorSelection::All));
    }

    #[test]
    fn any_other_string_selects_exactly_that_label() {
        match ExecutorSelection::from("gpu") {
            ExecutorSelection::Labels(labels) => assert_eq!(labels, vec!["gpu".to_string()]),
            ExecutorSelection::All => panic!("expected a single-label selection"),
        }
    }

    #[test]
    fn a_list_of_labels_selects_from_that_list() {
        match ExecutorSelection::from(vec!["a", "b"]) {
            ExecutorSelection::Labels(labels) => assert_eq!(labels, vec!["a".to_string(), "b".to_string()]),
            ExecutorSelection::All => panic!("expected a label-list selection"),
        }
    }
}
