// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use dfk_types::TaskError;
use parking_lot::Mutex;

use crate::core::Future;

/// Returned by `update_parent` when called on an `AppFuture` that has
/// already reached a terminal state (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateParentError;

impl std::fmt::Display for UpdateParentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("update_parent called on an AppFuture that is already done")
    }
}

impl std::error::Error for UpdateParentError {}

/// The caller-visible future for one submitted task (spec §3, §4.1).
///
/// In addition to the single-assignment result cell, an `AppFuture` owns an
/// ordered sequence of output-file futures (of type `O`, left generic here
/// so this crate does not need to know about the staging contract) and a
/// rebindable `parent` link. `update_parent` binds the `AppFuture` to follow
/// a parent future's terminal state: on success it mirrors the value
/// immediately; on failure it mirrors the error only once the parent
/// reports no retries remaining (`retries_left() == 0`), so a task that is
/// about to be retried does not prematurely fail its caller-visible future.
pub struct AppFuture<T, O = ()>
where
    T: Clone + Send + 'static,
    O: Clone + Send + 'static,
{
    future: Future<T>,
    outputs: Mutex<Vec<Future<O>>>,
}

impl<T, O> Clone for AppFuture<T, O>
where
    T: Clone + Send + 'static,
    O: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        AppFuture {
            future: self.future.clone(),
            outputs: Mutex::new(self.outputs.lock().clone()),
        }
    }
}

impl<T, O> AppFuture<T, O>
where
    T: Clone + Send + 'static,
    O: Clone + Send + 'static,
{
    pub fn new() -> Self {
        AppFuture {
            future: Future::new(),
            outputs: Mutex::new(Vec::new()),
        }
    }

    /// The underlying single-assignment cell. Exposed so the kernel can
    /// install the `handle_app_update` callback in `submit` (spec §4.5/§4.6).
    pub fn inner(&self) -> &Future<T> {
        &self.future
    }

    pub fn result(&self) -> Result<T, TaskError> {
        self.future.result()
    }

    pub fn exception(&self) -> Option<TaskError> {
        self.future.exception()
    }

    pub fn done(&self) -> bool {
        self.future.done()
    }

    pub fn add_done_callback<F>(&self, cb: F)
    where
        F: FnOnce(Result<T, TaskError>) + Send + 'static,
    {
        self.future.add_callback(cb);
    }

    /// Output-file futures attached to this task's `outputs=` kwarg (spec
    /// §4.6, §9 "Open Questions (b)"): callers must await these explicitly,
    /// they are siblings of this `AppFuture`, not something `result()`
    /// waits on.
    pub fn push_output(&self, output: Future<O>) {
        self.outputs.lock().push(output);
    }

    pub fn outputs(&self) -> Vec<Future<O>> {
        self.outputs.lock().clone()
    }

    /// Rebinds this `AppFuture` to follow `parent`'s terminal state (spec
    /// §4.1). Errors if this `AppFuture` is already done: once resolved, a
    /// single-assignment future cannot be made to track a different
    /// outcome.
    pub fn update_parent(&self, parent: Future<T>) -> Result<(), UpdateParentError> {
        if self.future.done() {
            return Err(UpdateParentError);
        }
        let mirror = self.future.clone();
        let retries_probe = parent.clone();
        parent.add_callback(move |outcome| match outcome {
            Ok(value) => {
                let _ = mirror.set_result(value);
            }
            Err(err) => {
                // A failing parent that still has retries left means the
                // launcher will rebind us to a fresh executor future; don't
                // finalize this AppFuture until the parent reports this was
                // the final attempt (spec §4.1, §4.6).
                if retries_probe.retries_left() <= 0 {
                    let _ = mirror.set_exception(err);
                }
            }
        });
        Ok(())
    }
}

impl<T, O> Default for AppFuture<T, O>
where
    T: Clone + Send + 'static,
    O: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
