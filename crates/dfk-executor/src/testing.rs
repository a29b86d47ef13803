// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! Executor test doubles, gated behind the `testing` feature so they never
//! ship in an ordinary build. `RecordingExecutor` exists to make
//! memoization hits observable (spec §8 scenario 5: "the second
//! submission's executor never to be called (observable via a counter in a
//! test executor)"); `MockScalingExecutor` exists to drive the strategy
//! controller's decision cases without a real provider.

use std::sync::atomic::{AtomicUsize, Ordering};

use dfk_future::Future;
use dfk_types::TaskError;
use parking_lot::Mutex;

use crate::block::{BlockStatus, WorkerReport};
use crate::executor_trait::{Executor, ExecutorStatus, Provider};

/// Runs every submitted closure inline (synchronously, on the submitting
/// thread) and counts how many times `submit` was called.
pub struct RecordingExecutor {
    label: String,
    calls: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new(label: impl Into<String>) -> Self {
        RecordingExecutor {
            label: label.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExecutorStatus for RecordingExecutor {
    fn label(&self) -> &str {
        &self.label
    }

    fn managed(&self) -> bool {
        true
    }

    fn scaling_enabled(&self) -> bool {
        false
    }

    fn outstanding(&self) -> usize {
        0
    }

    fn status(&self) -> Vec<BlockStatus> {
        Vec::new()
    }

    fn connected_workers(&self) -> Vec<WorkerReport> {
        Vec::new()
    }

    fn provider(&self) -> Option<&dyn Provider> {
        None
    }

    fn scale_out(&self, _n: usize) {}
    fn scale_in(&self, _n: usize, _block_ids: Option<&[String]>) {}
    fn shutdown(&self) {}
}

impl<V> Executor<V> for RecordingExecutor
where
    V: Clone + Send + 'static,
{
    fn submit(&self, task: Box<dyn FnOnce() -> Result<V, String> + Send>) -> Future<V> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let future: Future<V> = Future::new();
        match task() {
            Ok(value) => {
                let _ = future.set_result(value);
            }
            Err(message) => {
                let _ = future.set_exception(TaskError::Execution(message));
            }
        }
        future
    }
}

/// A `Provider` with bounds set directly by the test, rather than read from
/// a batch-scheduler configuration file.
pub struct MockProvider {
    pub min_blocks: usize,
    pub max_blocks: usize,
    pub nodes_per_block: usize,
    pub parallelism: f64,
}

impl Provider for MockProvider {
    fn min_blocks(&self) -> usize {
        self.min_blocks
    }
    fn max_blocks(&self) -> usize {
        self.max_blocks
    }
    fn nodes_per_block(&self) -> usize {
        self.nodes_per_block
    }
    fn parallelism(&self) -> f64 {
        self.parallelism
    }
}

/// One call the strategy controller made against a `MockScalingExecutor`,
/// recorded for the test to assert on afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleEvent {
    Out(usize),
    In(usize, Option<Vec<String>>),
}

/// A managed, scaling-enabled executor whose block/worker reports and
/// outstanding-task count are set directly by the test, and whose
/// `scale_out`/`scale_in` calls are recorded instead of acted on.
pub struct MockScalingExecutor {
    label: String,
    provider: MockProvider,
    outstanding: AtomicUsize,
    blocks: Mutex<Vec<BlockStatus>>,
    workers: Mutex<Vec<WorkerReport>>,
    events: Mutex<Vec<ScaleEvent>>,
    tasks_per_node: Option<usize>,
}

impl MockScalingExecutor {
    pub fn new(label: impl Into<String>, provider: MockProvider) -> Self {
        MockScalingExecutor {
            label: label.into(),
            provider,
            outstanding: AtomicUsize::new(0),
            blocks: Mutex::new(Vec::new()),
            workers: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            tasks_per_node: None,
        }
    }

    pub fn with_tasks_per_node(mut self, n: usize) -> Self {
        self.tasks_per_node = Some(n);
        self
    }

    pub fn set_outstanding(&self, n: usize) {
        self.outstanding.store(n, Ordering::SeqCst);
    }

    pub fn set_blocks(&self, blocks: Vec<BlockStatus>) {
        *self.blocks.lock() = blocks;
    }

    pub fn set_workers(&self, workers: Vec<WorkerReport>) {
        *self.workers.lock() = workers;
    }

    pub fn take_events(&self) -> Vec<ScaleEvent> {
        std::mem::take(&mut self.events.lock())
    }
}

impl ExecutorStatus for MockScalingExecutor {
    fn label(&self) -> &str {
        &self.label
    }

    fn managed(&self) -> bool {
        true
    }

    fn scaling_enabled(&self) -> bool {
        true
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn status(&self) -> Vec<BlockStatus> {
        self.blocks.lock().clone()
    }

    fn connected_workers(&self) -> Vec<WorkerReport> {
        self.workers.lock().clone()
    }

    fn provider(&self) -> Option<&dyn Provider> {
        Some(&self.provider)
    }

    fn tasks_per_node(&self) -> Option<usize> {
        self.tasks_per_node
    }

    fn scale_out(&self, n: usize) {
        self.events.lock().push(ScaleEvent::Out(n));
    }

    fn scale_in(&self, n: usize, block_ids: Option<&[String]>) {
        self.events
            .lock()
            .push(ScaleEvent::In(n, block_ids.map(|ids| ids.to_vec())));
    }

    fn shutdown(&self) {}
}

impl<V> Executor<V> for MockScalingExecutor
where
    V: Clone + Send + 'static,
{
    fn submit(&self, task: Box<dyn FnOnce() -> Result<V, String> + Send>) -> Future<V> {
        let future: Future<V> = Future::new();
        match task() {
            Ok(value) => {
                let _ = future.set_result(value);
            }
            Err(message) => {
                let _ = future.set_exception(TaskError::Execution(message));
            }
        }
        future
    }
}
