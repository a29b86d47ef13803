// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use dfk_checkpoint::CheckpointMode;
use dfk_future::Future;
use dfk_types::{Status, TaskError, TaskId};

use crate::launcher::Launcher;
use crate::registry::TaskRecord;
use crate::value::{as_remote_exception, Value};

/// Wires a freshly-submitted executor future into a task's lifecycle (spec
/// §4.5/§4.6 `handle_exec_update`/`handle_app_update`).
///
/// An intermediate `effective` future sits between the raw executor future
/// and the task's `AppFuture`: the raw future's completion is first passed
/// through the `RemoteExceptionWrapper` check (spec §7) before anything
/// downstream — the retry decision, memoization, the caller-visible
/// `AppFuture` — ever sees it. Both the `AppFuture`'s `update_parent` link
/// and this module's own retry/memoize bookkeeping are driven off
/// `effective`, never off the raw future directly.
pub(crate) fn install(launcher: Arc<Launcher>, task_id: TaskId, fut: Future<Value>) {
    let Some(task) = launcher.registry.get(task_id) else { return };

    let effective: Future<Value> = Future::new();
    effective.set_retries_left(retries_remaining_after_this_attempt(&launcher, &task));
    task.set_exec_fu(effective.clone());
    let _ = task.app_future.update_parent(effective.clone());

    let launcher_for_bookkeeping = Arc::clone(&launcher);
    effective.add_callback(move |outcome| {
        handle_outcome(launcher_for_bookkeeping, task_id, outcome);
    });

    let translate_into = effective;
    fut.add_callback(move |outcome| {
        let translated = match outcome {
            Ok(value) => match as_remote_exception(&value) {
                Some(remote_err) => Err(TaskError::from(remote_err)),
                None => Ok(value),
            },
            Err(err) => Err(err),
        };
        match translated {
            Ok(value) => {
                let _ = translate_into.set_result(value);
            }
            Err(err) => {
                let _ = translate_into.set_exception(err);
            }
        }
    });
}

fn retries_remaining_after_this_attempt(launcher: &Launcher, task: &TaskRecord) -> i64 {
    if !launcher.lazy_errors {
        return 0;
    }
    (launcher.retries as i64 - task.fail_count() as i64).max(0)
}

fn handle_outcome(launcher: Arc<Launcher>, task_id: TaskId, outcome: Result<Value, TaskError>) {
    let Some(task) = launcher.registry.get(task_id) else { return };
    task.mark_returned();

    match outcome {
        Ok(_) => {
            task.set_status(Status::Done);
            if let (Some(fingerprint), Some(exec_fu)) = (task.hashsum(), task.exec_fu()) {
                launcher.memoizer.update(task.memoize, fingerprint, exec_fu);
            }
            if matches!(launcher.checkpoint_mode, CheckpointMode::TaskExit) {
                launcher.checkpoint_task(task_id);
            }
            stage_out_outputs(&launcher, &task);
            launcher.emit_task_event(&task);
        }
        Err(err) => handle_failure(&launcher, task_id, &task, err),
    }
}

/// For each of this task's `outputs` that is remote, issues a `stage_out`
/// request on the task's own executor and forwards its outcome onto the
/// output future installed on `app_future` at submit time; a non-remote
/// output resolves immediately to its local path (spec §4.6 "for each
/// output file that is remote, issue a `stage_out` request on the same
/// executor (skipped for staging-internal tasks)").
fn stage_out_outputs(launcher: &Arc<Launcher>, task: &Arc<TaskRecord>) {
    if task.executor_label == launcher.staging.staging_executor_label() {
        return;
    }
    for (index, file) in task.outputs.iter().enumerate() {
        let Some(output_future) = task.output_future(index) else { continue };
        if !file.is_remote() {
            let _ = output_future.set_result(Value::String(file.path.clone()));
            continue;
        }
        let staged = launcher.staging.stage_out(file, &task.executor_label);
        let output_future = output_future.clone();
        staged.add_callback(move |outcome| match outcome {
            Ok(value) => {
                let _ = output_future.set_result(value);
            }
            Err(err) => {
                let _ = output_future.set_exception(err);
            }
        });
    }
}

fn handle_failure(launcher: &Arc<Launcher>, task_id: TaskId, task: &Arc<TaskRecord>, err: TaskError) {
    let fail_count = task.record_failure(std::sync::Arc::new(err.clone()));
    if launcher.lazy_errors && fail_count <= launcher.retries {
        tracing::warn!(
            task_id = %task_id,
            fail_count,
            retries = launcher.retries,
            error = %err,
            "task failed; retrying",
        );
        task.set_status(Status::Pending);
        launcher.emit_task_event(task);
        launcher.launch_task(task_id);
    } else {
        tracing::error!(task_id = %task_id, fail_count, error = %err, "task failed permanently");
        task.set_status(Status::Failed);
        launcher.emit_task_event(task);
    }
}
