// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use dfk_future::AppFuture;
use dfk_types::{Status, TaskError, TaskId};

use crate::registry::TaskRecord;
use crate::value::{Arg, Value};

/// What `DataFlowKernel::submit` hands back (spec §4.2 `submit(...) →
/// AppFuture`, §8 scenario 3's `b.id`/`b.status`): the original's
/// `AppFuture` carries its own task id (`fu.tid`) and the dataflow kernel's
/// own status table is consulted through it elsewhere in the source, so
/// this wraps the caller-visible future together with the id needed to
/// name it as another task's dependency and the status needed to inspect
/// its lifecycle directly, rather than returning a bare `AppFuture`.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    record: Arc<TaskRecord>,
}

impl TaskHandle {
    pub(crate) fn new(record: Arc<TaskRecord>) -> Self {
        TaskHandle { id: record.id, record }
    }

    /// This task's id, for naming it as another submission's dependency via
    /// `Arg::Dep`.
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> Status {
        self.record.status()
    }

    pub fn fail_count(&self) -> u32 {
        self.record.fail_count()
    }

    /// Every error this task has failed with so far, oldest first (spec §3
    /// `fail_history`, §8 scenario 4 `len(fail_history) == 2`).
    pub fn fail_history(&self) -> Vec<Arc<TaskError>> {
        self.record.fail_history()
    }

    /// Blocks until this task reaches a terminal state and returns its
    /// result, or the terminal error (spec §4.1 `AppFuture.result()`).
    pub fn result(&self) -> Result<Value, TaskError> {
        self.record.app_future.result()
    }

    /// The terminal error, if any, without blocking for one that hasn't
    /// happened yet (spec §4.1 `AppFuture.exception()`).
    pub fn exception(&self) -> Option<TaskError> {
        self.record.app_future.exception()
    }

    pub fn done(&self) -> bool {
        self.record.app_future.done()
    }

    /// The underlying caller-visible future, for callers that want the
    /// bare `AppFuture` (e.g. to register an additional done-callback).
    pub fn app_future(&self) -> &AppFuture<Value, Value> {
        &self.record.app_future
    }
}

impl From<&TaskHandle> for Arg {
    /// Lets a handle be passed directly wherever an `Arg` is expected,
    /// mirroring the original passing an `AppFuture` itself as a
    /// dependency argument (spec §3 "possibly containing futures").
    fn from(handle: &TaskHandle) -> Self {
        Arg::Dep(handle.id())
    }
}
