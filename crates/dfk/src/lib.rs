// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! The dataflow kernel: a dependency-aware task scheduling core for a
//! parallel workflow engine (spec §1, §2 OVERVIEW).
//!
//! A caller builds a [`Config`] naming one or more executors, constructs a
//! [`DataFlowKernel`] from it, and [`DataFlowKernel::submit`]s apps. Each
//! submission returns an [`AppFuture`] immediately; the kernel resolves
//! dependencies, consults the memo table, dispatches to an executor, and
//! retries or checkpoints as configured, all off the calling thread.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dfk::{Config, DataFlowKernel};
//! use dfk_executor::{Executor, ThreadPoolExecutor};
//!
//! let executor: Arc<dyn Executor<dfk::Value>> = Arc::new(ThreadPoolExecutor::new("local", 4));
//! let config = Config::builder().executor(executor).build().unwrap();
//! let kernel = DataFlowKernel::new(config).unwrap();
//!
//! let future = kernel
//!     .submit("double", None, true, "local", vec![dfk::Arg::Value(21.into())], vec![], |args| {
//!         Ok((args[0].as_i64().unwrap() * 2).into())
//!     })
//!     .unwrap();
//! assert_eq!(future.result().unwrap(), 42);
//!
//! kernel.cleanup().unwrap();
//! ```

mod active;
mod completion;
mod config;
mod executor_view;
mod kernel;
mod launcher;
mod monitoring;
mod registry;
mod resolver;
mod rundir;
mod task_handle;
mod timer;
mod value;

pub use active::{clear, current, load, ActiveKernelError};
pub use config::{Config, ConfigBuilder};
pub use kernel::{DataFlowKernel, KernelError};
pub use monitoring::{MonitoringSink, TaskEvent, TracingMonitoringSink, WorkflowInfo};
pub use task_handle::TaskHandle;
pub use value::{as_remote_exception, Arg, ExecutorSelection, NoopStaging, RemoteFile, StagingProvider, Value};

impl Config {
    /// Entry point into [`ConfigBuilder`], matching the original's
    /// keyword-argument-heavy `Config(...)` call with a fluent builder
    /// instead (spec §6).
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

pub use dfk_types::{
    BadCheckpoint, ConfigurationError, DependencyError, DuplicateTaskError, Fingerprint,
    RemoteExceptionWrapper, Status, TaskError, TaskId, TaskSnapshot,
};

pub use dfk_future::{AppFuture, Future, UpdateParentError};

pub use dfk_memoization::{fingerprint, Memoizer};

pub use dfk_checkpoint::{parse_period, CheckpointCandidate, CheckpointMode, Checkpointer, KernelState};

pub use dfk_executor::{
    BlockState, BlockStatus, Executor, ExecutorStatus, Provider, ThreadPoolExecutor, WorkerReport,
};

pub use dfk_strategy::{AllIdleWorkers, LongestRunningBlock, ScaleInSelector, StrategyController};
