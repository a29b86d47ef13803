// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dfk_future::{AppFuture, Future};
use dfk_types::{DuplicateTaskError, OptionalFingerprint, Status, TaskError, TaskId, TaskSnapshot};
use parking_lot::Mutex;

use crate::value::{Arg, RemoteFile, Value};

/// The user-supplied app body: takes the already-resolved argument values
/// and produces a result or an error message (spec §3 "the callable
/// itself"). `Fn`, not `FnOnce`, since a retried task invokes it again.
pub type AppFn = std::sync::Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// The live, mutable counterpart of `TaskSnapshot` (spec §3 `TaskRecord`):
/// everything the kernel needs while a task is in flight, plus the pieces a
/// `TaskSnapshot` intentionally drops (the callable, the live futures, the
/// resolved argument list).
///
/// Mutable fields are grouped behind a single `Mutex` rather than split
/// across several: every field here changes together, on the same
/// completion-handler code path, so one lock per task keeps that path from
/// having to reason about partial updates being visible mid-transition.
pub struct TaskRecord {
    pub id: TaskId,
    pub func_name: String,
    pub fn_hash: Option<String>,
    pub memoize: bool,
    pub executor_label: String,
    pub depends: Vec<TaskId>,
    /// The `outputs=` remote files named at submission (spec §6 reserved
    /// kwarg `outputs`), in the same order as `output_futures`.
    pub outputs: Vec<RemoteFile>,
    /// One placeholder future per entry in `outputs`, pushed onto
    /// `app_future`'s output sequence at construction time so a caller can
    /// obtain the future handle before the task even launches; fulfilled by
    /// the post-completion handler once the file is staged out (spec §3
    /// "an AppFuture ... owns an ordered sequence of output-file futures").
    output_futures: Vec<Future<Value>>,
    pub app_future: AppFuture<Value, Value>,
    mutable: Mutex<MutableState>,
}

struct MutableState {
    status: Status,
    fail_count: u32,
    fail_history: Vec<Arc<TaskError>>,
    exec_fu: Option<Future<Value>>,
    hashsum: OptionalFingerprint,
    time_submitted: Option<DateTime<Utc>>,
    time_returned: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        func_name: impl Into<String>,
        fn_hash: Option<String>,
        memoize: bool,
        executor_label: impl Into<String>,
        depends: Vec<TaskId>,
        outputs: Vec<RemoteFile>,
    ) -> Self {
        let app_future = AppFuture::new();
        let output_futures: Vec<Future<Value>> = outputs.iter().map(|_| Future::new()).collect();
        for fut in &output_futures {
            app_future.push_output(fut.clone());
        }
        TaskRecord {
            id,
            func_name: func_name.into(),
            fn_hash,
            memoize,
            executor_label: executor_label.into(),
            depends,
            outputs,
            output_futures,
            app_future,
            mutable: Mutex::new(MutableState {
                status: Status::Unsched,
                fail_count: 0,
                fail_history: Vec::new(),
                exec_fu: None,
                hashsum: None,
                time_submitted: None,
                time_returned: None,
            }),
        }
    }

    /// The output-file future paired with `self.outputs[index]`, installed
    /// on `app_future` at construction time (spec §3, §4.6).
    pub fn output_future(&self, index: usize) -> Option<&Future<Value>> {
        self.output_futures.get(index)
    }

    pub fn status(&self) -> Status {
        self.mutable.lock().status
    }

    pub fn set_status(&self, status: Status) {
        let mut state = self.mutable.lock();
        tracing::debug!(task_id = %self.id, from = %state.status, to = %status, "task status transition");
        state.status = status;
    }

    pub fn fail_count(&self) -> u32 {
        self.mutable.lock().fail_count
    }

    /// Increments `fail_count` and appends `err` to `fail_history` (spec §3
    /// "fail_count, fail_history: retry bookkeeping"; spec §4.6 "append the
    /// error to fail_history"). Called once per failed attempt, whether or
    /// not the task goes on to retry.
    pub fn record_failure(&self, err: Arc<TaskError>) -> u32 {
        let mut state = self.mutable.lock();
        state.fail_count += 1;
        state.fail_history.push(err);
        state.fail_count
    }

    pub fn fail_history(&self) -> Vec<Arc<TaskError>> {
        self.mutable.lock().fail_history.clone()
    }

    pub fn exec_fu(&self) -> Option<Future<Value>> {
        self.mutable.lock().exec_fu.clone()
    }

    pub fn set_exec_fu(&self, fut: Future<Value>) {
        self.mutable.lock().exec_fu = Some(fut);
    }

    pub fn hashsum(&self) -> OptionalFingerprint {
        self.mutable.lock().hashsum.clone()
    }

    pub fn set_hashsum(&self, fp: dfk_types::Fingerprint) {
        self.mutable.lock().hashsum = Some(fp);
    }

    pub fn mark_submitted(&self) {
        self.mutable.lock().time_submitted = Some(Utc::now());
    }

    pub fn mark_returned(&self) {
        self.mutable.lock().time_returned = Some(Utc::now());
    }

    /// A flat, serializable point-in-time copy, for monitoring emits and
    /// `log_task_states` (spec §4.6, §5). The original's
    /// `_create_task_log_info`.
    pub fn snapshot(&self) -> TaskSnapshot {
        let state = self.mutable.lock();
        TaskSnapshot {
            id: self.id,
            func_name: self.func_name.clone(),
            fn_hash: self.fn_hash.clone(),
            memoize: self.memoize,
            status: state.status,
            executor: self.executor_label.clone(),
            fail_count: state.fail_count,
            depends: self.depends.clone(),
            time_submitted: state.time_submitted,
            time_returned: state.time_returned,
        }
    }
}

/// The task registry (spec §3 `TaskRegistry`): dense, strictly-increasing
/// task ids mapping to `TaskRecord`s, plus the resolved argument tree kept
/// alongside it for the resolver to reread on retry.
pub struct TaskRegistry {
    next_id: std::sync::atomic::AtomicU64,
    records: DashMap<TaskId, std::sync::Arc<TaskRecord>>,
    args: DashMap<TaskId, Vec<Arg>>,
    apps: DashMap<TaskId, AppFn>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry {
            next_id: std::sync::atomic::AtomicU64::new(0),
            records: DashMap::new(),
            args: DashMap::new(),
            apps: DashMap::new(),
        }
    }

    /// Allocates the next dense task id (spec §3 invariants: "monotonic,
    /// dense, strictly increasing from zero within a run").
    pub fn next_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
    }

    pub fn insert(
        &self,
        record: std::sync::Arc<TaskRecord>,
        args: Vec<Arg>,
        app: AppFn,
    ) -> Result<(), DuplicateTaskError> {
        let id = record.id;
        if self.records.contains_key(&id) {
            return Err(DuplicateTaskError(id));
        }
        self.records.insert(id, record);
        self.args.insert(id, args);
        self.apps.insert(id, app);
        Ok(())
    }

    pub fn get(&self, id: TaskId) -> Option<std::sync::Arc<TaskRecord>> {
        self.records.get(&id).map(|e| e.value().clone())
    }

    pub fn args(&self, id: TaskId) -> Option<Vec<Arg>> {
        self.args.get(&id).map(|e| e.value().clone())
    }

    pub fn app(&self, id: TaskId) -> Option<AppFn> {
        self.apps.get(&id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every task's current state, in id order (spec §5
    /// "Shutdown": `log_task_states` walks every task once at cleanup).
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        let mut out: Vec<TaskSnapshot> = self.records.iter().map(|e| e.value().snapshot()).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn all(&self) -> Vec<std::sync::Arc<TaskRecord>> {
        self.records.iter().map(|e| e.value().clone()).collect()
    }
}
