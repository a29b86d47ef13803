// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use dfk_checkpoint::{CheckpointCandidate, CheckpointMode, Checkpointer};
use dfk_executor::Executor;
use dfk_memoization::Memoizer;
use dfk_types::{ConfigurationError, Status, TaskError, TaskId};
use rand::seq::SliceRandom;

use crate::monitoring::{MonitoringSink, TaskEvent};
use crate::registry::{TaskRecord, TaskRegistry};
use crate::resolver;
use crate::value::{ExecutorSelection, StagingProvider, Value};

/// Owns every collaborator the scheduling loop needs once a task has been
/// registered: where to find its dependencies, how to memoize and
/// checkpoint its result, and which executor runs it (spec §4, grounded in
/// the original's `DataFlowKernel.launch_if_ready`/`launch_task`/
/// `handle_exec_update`/`handle_app_update`).
///
/// Shared behind an `Arc` because task-completion callbacks run on
/// executor worker threads and need to call back into the same scheduling
/// state (to relaunch a retried task, to launch a now-unblocked dependent).
pub struct Launcher {
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) memoizer: Arc<Memoizer<Value>>,
    pub(crate) executors: DashMap<String, Arc<dyn Executor<Value>>>,
    pub(crate) staging: Arc<dyn StagingProvider>,
    pub(crate) checkpointer: Arc<Checkpointer<Value>>,
    pub(crate) checkpoint_mode: CheckpointMode,
    pub(crate) run_dir_label: String,
    pub(crate) retries: u32,
    pub(crate) lazy_errors: bool,
    pub(crate) monitoring: Option<Arc<dyn MonitoringSink>>,
}

impl Launcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<TaskRegistry>,
        memoizer: Arc<Memoizer<Value>>,
        executors: DashMap<String, Arc<dyn Executor<Value>>>,
        staging: Arc<dyn StagingProvider>,
        checkpointer: Arc<Checkpointer<Value>>,
        checkpoint_mode: CheckpointMode,
        run_dir_label: String,
        retries: u32,
        lazy_errors: bool,
        monitoring: Option<Arc<dyn MonitoringSink>>,
    ) -> Self {
        Launcher {
            registry,
            memoizer,
            executors,
            staging,
            checkpointer,
            checkpoint_mode,
            run_dir_label,
            retries,
            lazy_errors,
            monitoring,
        }
    }

    /// Resolves an `ExecutorSelection` to a single concrete executor label,
    /// chosen uniformly at random, fixed for the task's lifetime including
    /// retries (spec §4.5 "Executor selection at submit time"). `All`
    /// excludes the staging executor from the candidate pool (GLOSSARY
    /// "Staging executor: ... never selected for user apps").
    pub(crate) fn select_executor(&self, selection: &ExecutorSelection) -> Result<String, ConfigurationError> {
        let candidates: Vec<String> = match selection {
            ExecutorSelection::All => self
                .executors
                .iter()
                .map(|e| e.key().clone())
                .filter(|label| label != self.staging.staging_executor_label())
                .collect(),
            ExecutorSelection::Labels(labels) => labels
                .iter()
                .filter(|label| self.executors.contains_key(label.as_str()))
                .cloned()
                .collect(),
        };
        candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(ConfigurationError::NoExecutorsMatchSelection)
    }

    /// Gathers every future this task must wait on (explicit/embedded task
    /// dependencies plus staged remote-file inputs) and either launches
    /// immediately, when there are none, or arms a countdown that launches
    /// once the last one resolves (spec §4.3 `launch_if_ready`).
    pub fn launch_if_ready(self: &Arc<Self>, task_id: TaskId) {
        let Some(task) = self.registry.get(task_id) else { return };
        let Some(args) = self.registry.args(task_id) else { return };

        let mut deps = resolver::gather_all_deps(&self.registry, &task.depends, &args);
        deps.extend(resolver::add_input_deps(&args, &task.executor_label, self.staging.as_ref()));

        if deps.is_empty() {
            self.launch_task(task_id);
            return;
        }

        let remaining = Arc::new(AtomicUsize::new(deps.len()));
        for dep in deps {
            let launcher = Arc::clone(self);
            let remaining = Arc::clone(&remaining);
            dep.add_callback(move |_outcome| {
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    launcher.on_deps_ready(task_id);
                }
            });
        }
    }

    fn on_deps_ready(self: &Arc<Self>, task_id: TaskId) {
        let Some(task) = self.registry.get(task_id) else { return };
        let Some(args) = self.registry.args(task_id) else { return };

        let causes = resolver::failed_dep_causes(&self.registry, &task.depends, &args);
        if let Some(dep_err) = resolver::dependency_error(task_id, causes) {
            tracing::warn!(task_id = %task_id, "one or more dependencies failed; marking dep_fail");
            task.mark_returned();
            task.set_status(Status::DepFail);
            let _ = task.app_future.inner().set_exception(TaskError::from(dep_err));
            self.emit_task_event(&task);
            return;
        }
        self.launch_task(task_id);
    }

    /// Resolves a task's arguments, consults the memo table, and either
    /// reuses a memoized result or submits the task to its executor (spec
    /// §4.3/§4.7 `launch_task`). Also the re-entry point a retry calls back
    /// into from [`crate::completion`].
    pub(crate) fn launch_task(self: &Arc<Self>, task_id: TaskId) {
        let Some(task) = self.registry.get(task_id) else { return };
        let Some(args) = self.registry.args(task_id) else { return };

        task.set_status(Status::Launched);

        let resolved = match resolver::sanitize_and_wrap(&args, &self.registry) {
            Ok(v) => v,
            Err(e) => {
                self.fail_immediately(task_id, e);
                return;
            }
        };

        let Some(executor) = self.executors.get(&task.executor_label).map(|e| e.value().clone()) else {
            self.fail_immediately(
                task_id,
                TaskError::Execution(format!("no executor registered for label {}", task.executor_label)),
            );
            return;
        };

        let fingerprint = match task.hashsum() {
            Some(fp) => fp,
            None => {
                let fp = dfk_memoization::fingerprint(
                    &task.func_name,
                    task.fn_hash.as_deref(),
                    &Value::Array(resolved.clone()),
                );
                task.set_hashsum(fp.clone());
                fp
            }
        };

        let fut = match self.memoizer.check(task.memoize, &fingerprint) {
            Some(hit) => {
                tracing::info!(task_id = %task_id, %fingerprint, "memoization hit; skipping executor");
                hit
            }
            None => {
                let Some(app) = self.registry.app(task_id) else {
                    self.fail_immediately(
                        task_id,
                        TaskError::Execution("task has no registered app body".into()),
                    );
                    return;
                };
                executor.submit(Box::new(move || app(&resolved)))
            }
        };

        crate::completion::install(Arc::clone(self), task_id, fut);
    }

    fn fail_immediately(self: &Arc<Self>, task_id: TaskId, err: TaskError) {
        let Some(task) = self.registry.get(task_id) else { return };
        task.mark_returned();
        task.set_status(Status::Failed);
        let _ = task.app_future.inner().set_exception(err);
        self.emit_task_event(&task);
    }

    /// Appends this task's resolved result to the checkpoint log, if it
    /// opted into memoization (spec §4.8: only memoized results are worth
    /// replaying on a later run).
    pub(crate) fn checkpoint_task(&self, task_id: TaskId) {
        let Some(task) = self.registry.get(task_id) else { return };
        if !task.memoize {
            return;
        }
        let Some(fingerprint) = task.hashsum() else { return };
        let Some(exec_fu) = task.exec_fu() else { return };
        let Ok(result) = exec_fu.result() else { return };

        let candidate = CheckpointCandidate { task_id, fingerprint, result };
        if let Err(e) = self
            .checkpointer
            .checkpoint([candidate], self.registry.len() as u64, &self.run_dir_label)
        {
            tracing::warn!(task_id = %task_id, error = %e, "failed to checkpoint task");
        }
    }

    /// Gathers every completed, memoized-and-not-yet-written task across the
    /// whole registry and appends them to the checkpoint log in one pass
    /// (spec §4.8 `checkpoint(ids?)` with no `ids` given). Shared by
    /// `DataFlowKernel::checkpoint` (manual/final calls) and the periodic
    /// checkpoint timer.
    pub(crate) fn checkpoint_all(&self) -> Result<std::path::PathBuf, dfk_types::BadCheckpoint> {
        let candidates: Vec<CheckpointCandidate<Value>> = self
            .registry
            .all()
            .into_iter()
            .filter(|task| task.memoize && task.status() == Status::Done)
            .filter_map(|task| {
                let fingerprint = task.hashsum()?;
                let result = task.exec_fu()?.result().ok()?;
                Some(CheckpointCandidate { task_id: task.id, fingerprint, result })
            })
            .collect();
        self.checkpointer.checkpoint(candidates, self.registry.len() as u64, &self.run_dir_label)
    }

    pub(crate) fn emit_task_event(&self, task: &TaskRecord) {
        if let Some(sink) = &self.monitoring {
            sink.task_event(&TaskEvent { task_id: task.id, snapshot: task.snapshot() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NoopStaging;
    use dfk_executor::testing::RecordingExecutor;

    fn launcher_with(labels: &[&str]) -> Launcher {
        let executors: DashMap<String, Arc<dyn Executor<Value>>> = DashMap::new();
        for label in labels {
            let exec: Arc<dyn Executor<Value>> = Arc::new(RecordingExecutor::new(*label));
            executors.insert(label.to_string(), exec);
        }
        let tmp = tempfile::tempdir().unwrap();
        Launcher::new(
            Arc::new(TaskRegistry::new()),
            Arc::new(Memoizer::new(true)),
            executors,
            Arc::new(NoopStaging),
            Arc::new(Checkpointer::new(tmp.path(), CheckpointMode::Off)),
            CheckpointMode::Off,
            tmp.path().display().to_string(),
            0,
            true,
            None,
        )
    }

    #[test]
    fn a_single_label_selection_resolves_to_exactly_that_label() {
        let launcher = launcher_with(&["gpu", "cpu"]);
        let label = launcher.select_executor(&ExecutorSelection::Labels(vec!["gpu".into()])).unwrap();
        assert_eq!(label, "gpu");
    }

    #[test]
    fn an_unknown_label_is_rejected() {
        let launcher = launcher_with(&["gpu"]);
        let err = launcher.select_executor(&ExecutorSelection::Labels(vec!["missing".into()])).unwrap_err();
        assert!(matches!(err, ConfigurationError::NoExecutorsMatchSelection));
    }

    #[test]
    fn all_excludes_the_staging_executor() {
        let staging_label = NoopStaging.staging_executor_label().to_string();
        let launcher = launcher_with(&["cpu"]);
        launcher
            .executors
            .insert(staging_label.clone(), Arc::new(RecordingExecutor::new(staging_label.clone())));
        for _ in 0..20 {
            let label = launcher.select_executor(&ExecutorSelection::All).unwrap();
            assert_ne!(label, staging_label);
        }
    }

    #[test]
    fn all_picks_uniformly_among_the_configured_executors() {
        let launcher = launcher_with(&["a", "b", "c"]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(launcher.select_executor(&ExecutorSelection::All).unwrap());
        }
        assert_eq!(seen, ["a", "b", "c"].iter().map(|s| s.to_string()).collect());
    }
}
