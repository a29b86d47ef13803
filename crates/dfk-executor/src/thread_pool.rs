// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dfk_future::Future;
use dfk_types::TaskError;

use crate::block::{BlockState, BlockStatus, WorkerReport};
use crate::executor_trait::{Executor, ExecutorStatus};

/// A fixed-size, non-scaling executor backed by a `rayon` thread pool (spec
/// §6 "the concrete executor implementations... used only through their
/// interface contract" — this is the one concrete implementation the kernel
/// ships so tests and small workflows have something real to run against).
///
/// `scaling_enabled()` is always `false`: there is no provider to grow or
/// shrink, the pool's worker count is fixed at construction. It still
/// reports a single synthetic `BlockStatus::Running` block so strategy-less
/// code paths that enumerate `status()` see a consistent shape.
pub struct ThreadPoolExecutor {
    label: String,
    pool: rayon::ThreadPool,
    outstanding: Arc<AtomicUsize>,
}

impl ThreadPoolExecutor {
    pub fn new(label: impl Into<String>, workers: usize) -> Self {
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dfk-threadpool-{i}"))
            .build()
            .expect("failed to build rayon thread pool");
        ThreadPoolExecutor {
            label: label.into(),
            pool,
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ExecutorStatus for ThreadPoolExecutor {
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
        self.outstanding.load(Ordering::SeqCst)
    }

    fn status(&self) -> Vec<BlockStatus> {
        vec![BlockStatus {
            block_id: format!("{}-fixed", self.label),
            state: BlockState::Running,
        }]
    }

    fn connected_workers(&self) -> Vec<WorkerReport> {
        Vec::new()
    }

    fn provider(&self) -> Option<&dyn crate::executor_trait::Provider> {
        None
    }

    fn scale_out(&self, n: usize) {
        tracing::warn!(executor = %self.label, n, "scale_out requested on a non-scaling executor; ignoring");
    }

    fn scale_in(&self, n: usize, _block_ids: Option<&[String]>) {
        tracing::warn!(executor = %self.label, n, "scale_in requested on a non-scaling executor; ignoring");
    }

    fn shutdown(&self) {
        tracing::info!(executor = %self.label, "thread pool executor shut down");
    }
}

impl<V> Executor<V> for ThreadPoolExecutor
where
    V: Clone + Send + 'static,
{
    fn submit(&self, task: Box<dyn FnOnce() -> Result<V, String> + Send>) -> Future<V> {
        let future: Future<V> = Future::new();
        let handed_back = future.clone();
        let outstanding = Arc::clone(&self.outstanding);
        outstanding.fetch_add(1, Ordering::SeqCst);
        self.pool.spawn(move || {
            let outcome = task();
            outstanding.fetch_sub(1, Ordering::SeqCst);
            match outcome {
                Ok(value) => {
                    let _ = handed_back.set_result(value);
                }
                Err(message) => {
                    let _ = handed_back.set_exception(TaskError::Execution(message));
                }
            }
        });
        future
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_runs_the_closure_and_resolves_the_future() {
        let exec = ThreadPoolExecutor::new("local", 2);
        let fut: Future<i32> = <ThreadPoolExecutor as Executor<i32>>::submit(
            &exec,
            Box::new(|| Ok(41 + 1)),
        );
        assert_eq!(fut.result().unwrap(), 42);
    }

    #[test]
    fn a_failing_closure_sets_an_execution_error() {
        let exec = ThreadPoolExecutor::new("local", 1);
        let fut: Future<i32> = <ThreadPoolExecutor as Executor<i32>>::submit(
            &exec,
            Box::new(|| Err("boom".to_string())),
        );
        assert!(fut.exception().is_some());
    }
}
