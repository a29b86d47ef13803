// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use dfk_future::Future;

use crate::block::{BlockStatus, WorkerReport};

/// The V-independent face of an executor: everything the strategy
/// controller, the shutdown path, and monitoring need to observe or scale a
/// pool without caring what type of value its tasks produce (spec §9
/// "Polymorphic executors and providers" — this is the capability set that
/// replaces an inheritance hierarchy). `Executor<V>` below adds the one
/// operation, `submit`, that does depend on the task result type.
pub trait ExecutorStatus: Send + Sync {
    fn label(&self) -> &str;

    /// Whether the kernel owns this executor's lifecycle (spec GLOSSARY
    /// "Managed executor"): only managed executors are scaled in to zero
    /// and asked to shut down during `cleanup`.
    fn managed(&self) -> bool;

    fn scaling_enabled(&self) -> bool;

    /// Count of submissions that have not yet reached a terminal state
    /// (spec GLOSSARY "Outstanding").
    fn outstanding(&self) -> usize;

    fn status(&self) -> Vec<BlockStatus>;

    /// Per-manager self-reports, where meaningful; empty for executors that
    /// don't track individual workers (spec §6 "where meaningful").
    fn connected_workers(&self) -> Vec<WorkerReport>;

    fn provider(&self) -> Option<&dyn Provider>;

    /// Self-reported workers-per-node, when the executor variety tracks it
    /// (spec §9 "tasks_per_node... self-report"). Consulted before falling
    /// back to `configured_max_workers_per_node` and finally to `1`.
    fn tasks_per_node(&self) -> Option<usize> {
        None
    }

    /// A statically configured per-node worker ceiling (`workers_per_node`,
    /// `max_workers`, ...), for executors that don't self-report at runtime
    /// but do know their configured shape (spec §9 second fallback tier).
    fn configured_max_workers_per_node(&self) -> Option<usize> {
        None
    }

    fn scale_out(&self, n: usize);

    /// `block_ids`, when given, names which blocks to drain; `None` lets the
    /// executor pick (spec §4.9 case 1's idle scale-in, which has no
    /// specific blocks in mind, versus case 4's targeted drain).
    fn scale_in(&self, n: usize, block_ids: Option<&[String]>);

    fn shutdown(&self);
}

/// A pluggable worker pool (spec §6). Generic over `V`, the kernel-wide task
/// result type, so one kernel instance's executors all hand back the same
/// `Future<V>` shape regardless of which concrete pool ran the task.
///
/// `submit` takes ownership of a boxed thunk rather than `(func, args,
/// kwargs)` directly: the dependency resolver has already sanitized and
/// substituted arguments by the time a task reaches an executor (spec
/// §4.3), so from the executor's point of view a task is just "a closure to
/// run on a worker thread that produces a `V` or a failure message."
pub trait Executor<V>: ExecutorStatus
where
    V: Clone + Send + 'static,
{
    fn submit(&self, task: Box<dyn FnOnce() -> Result<V, String> + Send>) -> Future<V>;
}

/// A provider's scaling bounds (spec §6, §9): `min/max_blocks` fence the
/// allocation, `nodes_per_block` and `parallelism` feed the strategy
/// controller's slot math.
pub trait Provider: Send + Sync {
    fn min_blocks(&self) -> usize;
    fn max_blocks(&self) -> usize;
    fn nodes_per_block(&self) -> usize;
    /// Target ratio of slots to active tasks, in `[0, 1]` (spec GLOSSARY
    /// "Parallelism").
    fn parallelism(&self) -> f64;
}
