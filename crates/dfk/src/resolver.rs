// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use dfk_future::Future;
use dfk_types::{DependencyError, TaskError, TaskId};

use crate::registry::TaskRegistry;
use crate::value::{Arg, StagingProvider, Value};

/// Collects every task-id dependency named by `depends` or embedded as an
/// `Arg::Dep` inside `args`, deduplicated, and returns the corresponding
/// `AppFuture` inner futures to wait on before this task can launch (spec
/// §4.3 `_gather_all_deps`).
pub fn gather_all_deps(registry: &TaskRegistry, depends: &[TaskId], args: &[Arg]) -> Vec<Future<Value>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in depends.iter().copied().chain(args.iter().filter_map(|a| a.dep())) {
        if seen.insert(id) {
            if let Some(record) = registry.get(id) {
                out.push(record.app_future.inner().clone());
            }
        }
    }
    out
}

/// Issues stage-in requests for every remote `RemoteFile` argument destined
/// for `executor_label`, skipping staging when the target executor is the
/// staging executor itself (spec §4.3 "Staging is skipped when the target
/// executor is the staging executor itself"). Returned futures are added to
/// the task's wait set exactly like a task dependency.
pub fn add_input_deps(
    args: &[Arg],
    executor_label: &str,
    staging: &dyn StagingProvider,
) -> Vec<Future<Value>> {
    args.iter()
        .filter_map(|a| match a {
            Arg::RemoteFile(rf) if rf.is_remote() && staging.staging_executor_label() != executor_label => {
                Some(staging.stage_in(rf, executor_label))
            }
            _ => None,
        })
        .collect()
}

/// Collects the `TaskError` causes of every already-terminal, failed
/// dependency named by `depends`/embedded `Arg::Dep`s (spec §4.3
/// "Dependency errors: if any input future failed, ... folded into a
/// `DependencyError`"). Called once every wait-set future has resolved;
/// empty when every dependency succeeded.
pub fn failed_dep_causes(registry: &TaskRegistry, depends: &[TaskId], args: &[Arg]) -> Vec<std::sync::Arc<TaskError>> {
    let mut seen = HashSet::new();
    let mut causes = Vec::new();
    for id in depends.iter().copied().chain(args.iter().filter_map(|a| a.dep())) {
        if !seen.insert(id) {
            continue;
        }
        let Some(record) = registry.get(id) else { continue };
        if let Some(err) = record.app_future.exception() {
            causes.push(std::sync::Arc::new(err));
        }
    }
    causes
}

/// Builds a `DependencyError` from a task's failed dependencies, or `None`
/// if every dependency succeeded.
pub fn dependency_error(task_id: TaskId, causes: Vec<std::sync::Arc<TaskError>>) -> Option<DependencyError> {
    if causes.is_empty() {
        None
    } else {
        Some(DependencyError { causes, task_id })
    }
}

/// Replaces every `Arg` with its final resolved `Value`: `Value` args pass
/// through verbatim, `Dep` args are substituted with the referenced task's
/// resolved result, and `RemoteFile` args resolve to their (by now staged)
/// local path (spec §4.3 `sanitize_and_wrap`).
///
/// Must only be called once every future in [`gather_all_deps`] /
/// [`add_input_deps`]'s combined wait set is done and none of the task
/// dependencies failed; callers enforce that ordering via
/// [`failed_dep_causes`] first.
pub fn sanitize_and_wrap(args: &[Arg], registry: &TaskRegistry) -> Result<Vec<Value>, TaskError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        let resolved = match arg {
            Arg::Value(v) => v.clone(),
            Arg::RemoteFile(rf) => Value::String(rf.path.clone()),
            Arg::Dep(id) => {
                let record = registry
                    .get(*id)
                    .expect("a task's dependency must already be registered before it is resolved");
                record.app_future.result()?
            }
        };
        out.push(resolved);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TaskRecord;
    use crate::value::NoopStaging;
    use std::sync::Arc;

    fn make_done_task(registry: &TaskRegistry, id: TaskId, value: Value) {
        let record = Arc::new(TaskRecord::new(id, "f", None, false, "local", vec![], vec![]));
        record.app_future.inner().set_result(value).unwrap();
        registry
            .insert(record, vec![], Arc::new(|_: &[Value]| Ok(Value::Null)))
            .unwrap();
    }

    #[test]
    fn gather_all_deps_dedupes_explicit_and_embedded_ids() {
        let registry = TaskRegistry::new();
        make_done_task(&registry, TaskId(0), Value::from(1));
        let args = vec![Arg::Dep(TaskId(0))];
        let deps = gather_all_deps(&registry, &[TaskId(0)], &args);
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn add_input_deps_skips_the_staging_executor_itself() {
        let staging = NoopStaging;
        let rf = crate::value::RemoteFile::remote("/data/x.txt");
        let args = vec![Arg::RemoteFile(rf)];
        let deps = add_input_deps(&args, staging.staging_executor_label(), &staging);
        assert!(deps.is_empty());
    }

    #[test]
    fn add_input_deps_stages_a_remote_file_for_another_executor() {
        let staging = NoopStaging;
        let rf = crate::value::RemoteFile::remote("/data/x.txt");
        let args = vec![Arg::RemoteFile(rf)];
        let deps = add_input_deps(&args, "worker-executor", &staging);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].result().unwrap(), Value::String("/data/x.txt".into()));
    }

    #[test]
    fn sanitize_and_wrap_substitutes_a_resolved_dependency() {
        let registry = TaskRegistry::new();
        make_done_task(&registry, TaskId(0), Value::from(41));
        let args = vec![Arg::Value(Value::from(1)), Arg::Dep(TaskId(0))];
        let resolved = sanitize_and_wrap(&args, &registry).unwrap();
        assert_eq!(resolved, vec![Value::from(1), Value::from(41)]);
    }

    #[test]
    fn failed_dep_causes_is_empty_when_all_deps_succeeded() {
        let registry = TaskRegistry::new();
        make_done_task(&registry, TaskId(0), Value::from(1));
        let causes = failed_dep_causes(&registry, &[TaskId(0)], &[]);
        assert!(causes.is_empty());
    }

    #[test]
    fn failed_dep_causes_collects_a_failed_dependency() {
        let registry = TaskRegistry::new();
        let record = Arc::new(TaskRecord::new(TaskId(0), "f", None, false, "local", vec![], vec![]));
        record
            .app_future
            .inner()
            .set_exception(TaskError::Execution("boom".into()))
            .unwrap();
        registry
            .insert(record, vec![], Arc::new(|_: &[Value]| Ok(Value::Null)))
            .unwrap();
        let causes = failed_dep_causes(&registry, &[TaskId(0)], &[]);
        assert_eq!(causes.len(), 1);
        assert!(dependency_error(TaskId(1), causes).is_some());
    }
}
