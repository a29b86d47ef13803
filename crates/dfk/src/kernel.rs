// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dfk_checkpoint::{CheckpointMode, Checkpointer};
use dfk_executor::ExecutorStatus;
use dfk_strategy::StrategyController;
use dfk_types::{BadCheckpoint, ConfigurationError, DuplicateTaskError, Status, TaskId, TaskSnapshot};

use crate::config::Config;
use crate::executor_view::ExecutorStatusView;
use crate::launcher::Launcher;
use crate::monitoring::{MonitoringSink, WorkflowInfo};
use crate::registry::{TaskRecord, TaskRegistry};
use crate::task_handle::TaskHandle;
use crate::timer::PeriodicTimer;
use crate::value::{Arg, ExecutorSelection, RemoteFile, Value};

/// Errors that can occur constructing a [`DataFlowKernel`]: either the
/// `Config` itself is malformed, or a checkpoint file named in it could not
/// be loaded (spec §7).
#[derive(Debug, thiserror::Error, Clone)]
pub enum KernelError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Checkpoint(#[from] BadCheckpoint),
}

/// The dependency-aware task scheduling core (spec §1, §2 OVERVIEW): the
/// facade a caller submits apps through, grounded in the original's
/// `DataFlowKernel`.
///
/// Everything stateful lives behind `Arc`s owned by `Launcher`; this struct
/// is the thin, cloneable-by-reference front door plus the handful of
/// whole-kernel operations (`checkpoint`, `cleanup`, `log_task_states`) that
/// don't belong to any single task.
pub struct DataFlowKernel {
    registry: Arc<TaskRegistry>,
    launcher: Arc<Launcher>,
    run_dir: PathBuf,
    monitoring: Option<Arc<dyn MonitoringSink>>,
    run_id: String,
    time_began: chrono::DateTime<Utc>,
    cleaned_up: AtomicBool,
    strategy_timer: parking_lot::Mutex<Option<PeriodicTimer>>,
    checkpoint_timer: parking_lot::Mutex<Option<PeriodicTimer>>,
}

impl DataFlowKernel {
    pub fn new(config: Config) -> Result<Self, KernelError> {
        let run_dir = crate::rundir::make_rundir(&config.run_dir)?;

        let memoizer = Arc::new(dfk_memoization::Memoizer::new(config.app_cache));
        if !config.checkpoint_files.is_empty() {
            let preload = Checkpointer::<Value>::load(&config.checkpoint_files)?;
            tracing::info!(count = preload.len(), "preloaded memo entries from checkpoint");
            memoizer.preload(preload);
        }

        let executors: DashMap<String, Arc<dyn dfk_executor::Executor<Value>>> = DashMap::new();
        for executor in &config.executors {
            executors.insert(executor.label().to_string(), Arc::clone(executor));
        }

        let checkpointer = Arc::new(Checkpointer::<Value>::new(&run_dir, config.checkpoint_mode));
        let run_dir_label = run_dir.display().to_string();

        // A V-independent view of every configured executor, for the
        // strategy controller (spec §4.9, §9 "Polymorphic executors and
        // providers"). Built once here rather than on every tick: the
        // executor set is fixed for the life of the kernel (spec §6).
        let executor_statuses: Vec<Arc<dyn ExecutorStatus>> = config
            .executors
            .iter()
            .map(|e| Arc::new(ExecutorStatusView(Arc::clone(e))) as Arc<dyn ExecutorStatus>)
            .collect();

        let registry = Arc::new(TaskRegistry::new());
        let launcher = Arc::new(Launcher::new(
            Arc::clone(&registry),
            memoizer,
            executors,
            config.staging,
            checkpointer,
            config.checkpoint_mode,
            run_dir_label,
            config.retries,
            config.lazy_errors,
            config.monitoring.clone(),
        ));

        let run_id = uuid::Uuid::new_v4().to_string();
        let time_began = Utc::now();

        let strategy = Arc::new(StrategyController::with_selector(Arc::clone(&config.scale_in_selector)));
        let strategy_period = config.strategy_period;
        let strategy_timer = PeriodicTimer::spawn("dfk-strategy", strategy_period, move || {
            strategy.tick(&executor_statuses);
        });

        let checkpoint_timer = match config.checkpoint_mode {
            CheckpointMode::Periodic(period) => {
                let launcher_for_timer = Arc::clone(&launcher);
                Some(PeriodicTimer::spawn("dfk-checkpoint", period, move || {
                    if let Err(e) = launcher_for_timer.checkpoint_all() {
                        tracing::warn!(error = %e, "periodic checkpoint failed");
                    }
                }))
            }
            _ => None,
        };

        let kernel = DataFlowKernel {
            registry,
            launcher,
            run_dir: run_dir.clone(),
            monitoring: config.monitoring,
            run_id: run_id.clone(),
            time_began,
            cleaned_up: AtomicBool::new(false),
            strategy_timer: parking_lot::Mutex::new(Some(strategy_timer)),
            checkpoint_timer: parking_lot::Mutex::new(checkpoint_timer),
        };

        if let Some(sink) = &kernel.monitoring {
            sink.workflow_started(&WorkflowInfo {
                run_id,
                run_dir: run_dir.display().to_string(),
                time_began,
                time_completed: None,
                task_count: 0,
            });
        }

        tracing::info!(run_dir = %kernel.run_dir.display(), "dataflow kernel initialized");
        Ok(kernel)
    }

    pub fn run_dir(&self) -> &std::path::Path {
        &self.run_dir
    }

    /// Registers a new task and, once its dependencies are already
    /// resolved (or immediately, if it has none), hands it to the launcher
    /// (spec §4.2/§4.3 `submit`). `depends` is derived entirely from the
    /// `Arg::Dep` entries already present in `args`: there is no separate
    /// explicit-dependency list at this boundary, matching the original's
    /// single `args`/`kwargs` scan. `outputs` names this task's remote
    /// output files (spec §6 reserved kwarg `outputs`); the caller-visible
    /// future for each one is installed on the returned handle's `AppFuture`
    /// before this call returns and fulfilled once the post-completion
    /// handler stages it out (spec §4.6).
    pub fn submit<F>(
        &self,
        func_name: impl Into<String>,
        fn_hash: Option<String>,
        memoize: bool,
        executors: impl Into<ExecutorSelection>,
        args: Vec<Arg>,
        outputs: Vec<RemoteFile>,
        app: F,
    ) -> Result<TaskHandle, ConfigurationError>
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        if self.cleaned_up.load(Ordering::SeqCst) {
            return Err(ConfigurationError::AlreadyCleanedUp);
        }

        // Executor selection happens once, at submit time, and is fixed for
        // the task's lifetime including retries (spec §4.5).
        let executor_label = self.launcher.select_executor(&executors.into())?;

        let id = self.registry.next_id();
        let depends: Vec<TaskId> = args.iter().filter_map(|a| a.dep()).collect();
        let record = Arc::new(TaskRecord::new(id, func_name, fn_hash, memoize, executor_label, depends, outputs));
        record.mark_submitted();
        record.set_status(Status::Pending);

        let handle = TaskHandle::new(Arc::clone(&record));
        self.insert_task(record, args, Arc::new(app));
        self.launcher.launch_if_ready(id);
        Ok(handle)
    }

    fn insert_task(&self, record: Arc<TaskRecord>, args: Vec<Arg>, app: crate::registry::AppFn) {
        match self.registry.insert(record, args, app) {
            Ok(()) => {}
            Err(DuplicateTaskError(id)) => {
                unreachable!("TaskRegistry::next_id allocates unique ids; id {id} was reused")
            }
        }
    }

    /// Writes every completed, memoized-and-not-yet-written task to the
    /// checkpoint log (spec §4.8 "Returns: Checkpoint dir if checkpoints
    /// were written successfully"). Also what the periodic checkpoint timer
    /// and the final checkpoint in `cleanup` call, via `Launcher::checkpoint_all`.
    pub fn checkpoint(&self) -> Result<PathBuf, BadCheckpoint> {
        self.launcher.checkpoint_all()
    }

    /// Blocks until every submitted task has reached a terminal state,
    /// ignoring individual task failures (spec §5 "Shutdown").
    pub fn wait_for_current_tasks(&self) {
        for task in self.registry.all() {
            let _ = task.app_future.result();
        }
    }

    /// A point-in-time snapshot of every task's lifecycle state, in
    /// submission order (spec §4.6/§5 `log_task_states`).
    pub fn log_task_states(&self) -> Vec<TaskSnapshot> {
        self.registry.snapshots()
    }

    /// Waits for outstanding work, writes a final checkpoint, and scales
    /// every managed executor down before shutting it down (spec §5
    /// "Shutdown"). Idempotent: a second call returns
    /// `ConfigurationError::AlreadyCleanedUp` rather than re-running
    /// teardown (spec §10.6 "idempotent double-cleanup guard").
    pub fn cleanup(&self) -> Result<(), ConfigurationError> {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            return Err(ConfigurationError::AlreadyCleanedUp);
        }

        self.wait_for_current_tasks();
        if let Err(e) = self.checkpoint() {
            tracing::warn!(error = %e, "final checkpoint on cleanup failed");
        }

        if let Some(timer) = self.strategy_timer.lock().take() {
            timer.stop();
        }
        if let Some(timer) = self.checkpoint_timer.lock().take() {
            timer.stop();
        }

        for executor in self.launcher.executors.iter() {
            if executor.managed() {
                if executor.scaling_enabled() {
                    let active_blocks = executor.status().iter().filter(|b| b.state.is_active()).count();
                    executor.scale_in(active_blocks, None);
                }
                executor.shutdown();
            }
        }

        if let Some(sink) = &self.monitoring {
            sink.workflow_ended(&WorkflowInfo {
                run_id: self.run_id.clone(),
                run_dir: self.run_dir.display().to_string(),
                time_began: self.time_began,
                time_completed: Some(Utc::now()),
                task_count: self.registry.len() as u64,
            });
        }

        tracing::info!(run_dir = %self.run_dir.display(), "dataflow kernel cleaned up");
        Ok(())
    }
}
