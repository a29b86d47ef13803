// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use dfk_executor::{BlockStatus, Executor, ExecutorStatus, Provider, WorkerReport};

use crate::value::Value;

/// Wraps an `Arc<dyn Executor<Value>>` so it can be handed to
/// [`dfk_strategy::StrategyController`] as an `Arc<dyn ExecutorStatus>`.
///
/// Stable Rust has no coercion from one trait object to another ("trait
/// upcasting"), so an `Arc<dyn Executor<Value>>` cannot simply be reborrowed
/// as `Arc<dyn ExecutorStatus>` even though `Executor<V>: ExecutorStatus`.
/// This view sidesteps that by being its own concrete, `Sized` type that
/// forwards every call to the wrapped executor (spec §4.9, §9 "Polymorphic
/// executors and providers").
pub(crate) struct ExecutorStatusView(pub Arc<dyn Executor<Value>>);

impl ExecutorStatus for ExecutorStatusView {
    fn label(&self) -> &str {
        self.0.label()
    }

    fn managed(&self) -> bool {
        self.0.managed()
    }

    fn scaling_enabled(&self) -> bool {
        self.0.scaling_enabled()
    }

    fn outstanding(&self) -> usize {
        self.0.outstanding()
    }

    fn status(&self) -> Vec<BlockStatus> {
        self.0.status()
    }

    fn connected_workers(&self) -> Vec<WorkerReport> {
        self.0.connected_workers()
    }

    fn provider(&self) -> Option<&dyn Provider> {
        self.0.provider()
    }

    fn tasks_per_node(&self) -> Option<usize> {
        self.0.tasks_per_node()
    }

    fn configured_max_workers_per_node(&self) -> Option<usize> {
        self.0.configured_max_workers_per_node()
    }

    fn scale_out(&self, n: usize) {
        self.0.scale_out(n)
    }

    fn scale_in(&self, n: usize, block_ids: Option<&[String]>) {
        self.0.scale_in(n, block_ids)
    }

    fn shutdown(&self) {
        self.0.shutdown()
    }
}
