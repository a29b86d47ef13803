// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use dfk_checkpoint::{parse_period, CheckpointMode};
use dfk_executor::Executor;
use dfk_strategy::{AllIdleWorkers, ScaleInSelector};
use dfk_types::ConfigurationError;

use crate::value::{NoopStaging, StagingProvider, Value};

/// The full construction surface of a `DataFlowKernel` (spec §6): which
/// executors to schedule onto, where the run directory lives, and the
/// memoization/checkpoint/retry/strategy knobs.
///
/// Mirrors the original's `parsl.config.Config` dataclass: a plain struct
/// with no behavior beyond validating its own shape at construction time.
pub struct Config {
    pub executors: Vec<Arc<dyn Executor<Value>>>,
    pub run_dir: PathBuf,
    pub app_cache: bool,
    pub checkpoint_files: Vec<PathBuf>,
    pub checkpoint_mode: CheckpointMode,
    pub retries: u32,
    pub lazy_errors: bool,
    pub strategy_period: std::time::Duration,
    pub scale_in_selector: Arc<dyn ScaleInSelector>,
    pub data_management_max_threads: usize,
    pub monitoring: Option<Arc<dyn crate::monitoring::MonitoringSink>>,
    pub staging: Arc<dyn StagingProvider>,
}

/// Builds a `Config` incrementally, matching the original's keyword-heavy
/// `Config(...)` constructor call style while giving every field a sane
/// default (spec §6).
pub struct ConfigBuilder {
    executors: Vec<Arc<dyn Executor<Value>>>,
    run_dir: PathBuf,
    app_cache: bool,
    checkpoint_files: Vec<PathBuf>,
    checkpoint_mode: CheckpointMode,
    checkpoint_period: Option<String>,
    retries: u32,
    lazy_errors: bool,
    strategy_period: std::time::Duration,
    scale_in_selector: Arc<dyn ScaleInSelector>,
    data_management_max_threads: usize,
    monitoring: Option<Arc<dyn crate::monitoring::MonitoringSink>>,
    staging: Arc<dyn StagingProvider>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            executors: Vec::new(),
            run_dir: PathBuf::from("runinfo"),
            app_cache: true,
            checkpoint_files: Vec::new(),
            checkpoint_mode: CheckpointMode::Off,
            checkpoint_period: None,
            retries: 0,
            lazy_errors: true,
            strategy_period: std::time::Duration::from_secs(5),
            scale_in_selector: Arc::new(AllIdleWorkers),
            data_management_max_threads: 10,
            monitoring: None,
            staging: Arc::new(NoopStaging),
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executor(mut self, executor: Arc<dyn Executor<Value>>) -> Self {
        self.executors.push(executor);
        self
    }

    pub fn run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_dir = dir.into();
        self
    }

    pub fn app_cache(mut self, enabled: bool) -> Self {
        self.app_cache = enabled;
        self
    }

    pub fn checkpoint_files(mut self, files: Vec<PathBuf>) -> Self {
        self.checkpoint_files = files;
        self
    }

    pub fn checkpoint_mode(mut self, mode: CheckpointMode) -> Self {
        self.checkpoint_mode = mode;
        self
    }

    /// A `HH:MM:SS` period; only consulted when `checkpoint_mode` is
    /// `Periodic`. Stored raw so validation happens in `build()`, where
    /// malformed input becomes a `ConfigurationError` rather than silently
    /// falling back (spec §7 — the silent-fallback behavior in
    /// `dfk_checkpoint::mode::parse_period` is reserved for the checkpointer
    /// parsing an *already-accepted* config value at runtime).
    pub fn checkpoint_period(mut self, raw: impl Into<String>) -> Self {
        self.checkpoint_period = Some(raw.into());
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.retries = n;
        self
    }

    pub fn lazy_errors(mut self, enabled: bool) -> Self {
        self.lazy_errors = enabled;
        self
    }

    pub fn strategy_period(mut self, period: std::time::Duration) -> Self {
        self.strategy_period = period;
        self
    }

    pub fn scale_in_selector(mut self, selector: Arc<dyn ScaleInSelector>) -> Self {
        self.scale_in_selector = selector;
        self
    }

    pub fn data_management_max_threads(mut self, n: usize) -> Self {
        self.data_management_max_threads = n;
        self
    }

    pub fn monitoring(mut self, sink: Arc<dyn crate::monitoring::MonitoringSink>) -> Self {
        self.monitoring = Some(sink);
        self
    }

    pub fn staging(mut self, staging: Arc<dyn StagingProvider>) -> Self {
        self.staging = staging;
        self
    }

    /// Validates the accumulated shape and produces a `Config` (spec §7: "A
    /// malformed config (... no executors) is rejected at construction,
    /// before any task is ever submitted").
    pub fn build(self) -> Result<Config, ConfigurationError> {
        if self.executors.is_empty() {
            return Err(ConfigurationError::NoExecutors);
        }

        let checkpoint_mode = match (&self.checkpoint_mode, &self.checkpoint_period) {
            (CheckpointMode::Periodic(_), Some(raw)) => {
                let parts: Vec<&str> = raw.split(':').collect();
                let well_formed = parts.len() == 3 && parts.iter().all(|p| p.parse::<u64>().is_ok());
                if !well_formed {
                    return Err(ConfigurationError::InvalidCheckpointPeriod { raw: raw.clone() });
                }
                CheckpointMode::Periodic(parse_period(raw))
            }
            (mode, _) => *mode,
        };

        Ok(Config {
            executors: self.executors,
            run_dir: self.run_dir,
            app_cache: self.app_cache,
            checkpoint_files: self.checkpoint_files,
            checkpoint_mode,
            retries: self.retries,
            lazy_errors: self.lazy_errors,
            strategy_period: self.strategy_period,
            scale_in_selector: self.scale_in_selector,
            data_management_max_threads: self.data_management_max_threads,
            monitoring: self.monitoring,
            staging: self.staging,
        })
    }
}
