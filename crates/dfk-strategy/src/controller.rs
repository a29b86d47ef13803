// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dfk_executor::ExecutorStatus;

use crate::selector::ScaleInSelector;

/// Default `max_idletime`: two minutes (spec §4.9 `max_idletime` default).
pub const DEFAULT_MAX_IDLETIME: Duration = Duration::from_secs(120);

/// Per-executor state the controller carries between ticks: just the idle
/// timer (spec §4.9 "on subsequent ticks... if now - idle_since >
/// max_idletime"). Cleared on any non-idle observation.
#[derive(Default)]
struct ExecutorState {
    idle_since: Option<Instant>,
}

/// The periodic autoscaling control loop (spec §4.9). One controller
/// instance is shared across every tick; it owns per-executor idle timers
/// and delegates the over-provisioned drain choice to a [`ScaleInSelector`].
///
/// Generic only over the selector, not over the kernel's task-result type:
/// every input this controller needs (`ExecutorStatus`) is already
/// V-independent (spec §9 "Polymorphic executors and providers").
pub struct StrategyController<S: ScaleInSelector = crate::selector::AllIdleWorkers> {
    max_idletime: Duration,
    selector: S,
    state: DashMap<String, ExecutorState>,
}

impl StrategyController<crate::selector::AllIdleWorkers> {
    pub fn new() -> Self {
        Self::with_selector(crate::selector::AllIdleWorkers)
    }
}

impl Default for StrategyController<crate::selector::AllIdleWorkers> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ScaleInSelector> StrategyController<S> {
    pub fn with_selector(selector: S) -> Self {
        StrategyController {
            max_idletime: DEFAULT_MAX_IDLETIME,
            selector,
            state: DashMap::new(),
        }
    }

    pub fn with_max_idletime(mut self, d: Duration) -> Self {
        self.max_idletime = d;
        self
    }

    /// One control-loop tick over every executor (spec §4.9, evaluated in
    /// the documented case order). Non-scaling executors are skipped
    /// entirely.
    pub fn tick(&self, executors: &[Arc<dyn ExecutorStatus>]) {
        for executor in executors {
            if !executor.scaling_enabled() {
                continue;
            }
            self.tick_one(executor.as_ref());
        }
    }

    fn tick_one(&self, executor: &dyn ExecutorStatus) {
        let label = executor.label().to_string();
        let active_tasks = executor.outstanding();
        let blocks = executor.status();
        let active_blocks = blocks.iter().filter(|b| b.state.is_active()).count();
        let workers = executor.connected_workers();

        self.selector.observe(&workers);

        let Some(provider) = executor.provider() else {
            tracing::warn!(executor = %label, "scaling is enabled but no provider is configured; skipping tick");
            return;
        };
        let min_blocks = provider.min_blocks();
        let max_blocks = provider.max_blocks();
        let nodes_per_block = provider.nodes_per_block();
        let parallelism = provider.parallelism();
        let tasks_per_node = executor
            .tasks_per_node()
            .or_else(|| executor.configured_max_workers_per_node())
            .unwrap_or(1);
        let active_slots = active_blocks * tasks_per_node * nodes_per_block;

        tracing::debug!(
            executor = %label,
            active_tasks,
            active_blocks,
            active_slots,
            connected_workers = workers.len(),
            "strategy tick",
        );

        // Case 1: idle.
        if active_tasks == 0 {
            if active_blocks <= min_blocks {
                return;
            }
            let mut entry = self.state.entry(label.clone()).or_default();
            match entry.idle_since {
                None => {
                    tracing::debug!(executor = %label, max_idletime = ?self.max_idletime, "executor went idle; starting kill timer");
                    entry.idle_since = Some(Instant::now());
                }
                Some(since) if since.elapsed() > self.max_idletime => {
                    let n = active_blocks - min_blocks;
                    tracing::info!(executor = %label, n, "idle timer expired; scaling in");
                    executor.scale_in(n, None);
                    entry.idle_since = None;
                }
                Some(_) => {}
            }
            return;
        }

        // Any non-idle tick clears the timer (spec §4.9 "Any non-idle
        // observation clears idle_since for that executor").
        if let Some(mut entry) = self.state.get_mut(&label) {
            entry.idle_since = None;
        }

        // Case 2: under-provisioned.
        if (active_slots as f64) / (active_tasks as f64) < parallelism && active_blocks < max_blocks {
            let slots_needed = (active_tasks as f64) * parallelism - (active_slots as f64);
            let excess = slots_needed.max(0.0).ceil() as usize;
            let per_block = (tasks_per_node * nodes_per_block).max(1);
            let excess_blocks = excess.div_ceil(per_block);
            let to_request = excess_blocks.min(max_blocks - active_blocks);
            if to_request > 0 {
                tracing::debug!(executor = %label, active_blocks, to_request, "under-provisioned; requesting blocks");
                executor.scale_out(to_request);
            }
            return;
        }

        // Case 3: stalled (no capacity at all, but tasks waiting).
        if active_slots == 0 && active_tasks > 0 {
            tracing::debug!(executor = %label, "stalled with zero slots; requesting a single block");
            executor.scale_out(1);
            return;
        }

        // Case 4: over-provisioned.
        if active_slots > active_tasks {
            if let Some(block_id) = self.selector.select(&workers) {
                tracing::debug!(executor = %label, block_id = %block_id, "over-provisioned; draining block");
                executor.scale_in(1, Some(std::slice::from_ref(&block_id)));
            }
            return;
        }

        // Case 5: balanced; do nothing.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfk_executor::testing::{MockProvider, MockScalingExecutor, ScaleEvent};
    use dfk_executor::{BlockState, BlockStatus};

    fn as_status(exec: &Arc<MockScalingExecutor>) -> Arc<dyn ExecutorStatus> {
        let cloned: Arc<MockScalingExecutor> = Arc::clone(exec);
        cloned as Arc<dyn ExecutorStatus>
    }

    fn new_executor(min: usize, max: usize, nodes_per_block: usize, parallelism: f64) -> MockScalingExecutor {
        MockScalingExecutor::new(
            "mock",
            MockProvider {
                min_blocks: min,
                max_blocks: max,
                nodes_per_block,
                parallelism,
            },
        )
    }

    #[test]
    fn scales_out_when_under_provisioned() {
        let exec = Arc::new(new_executor(0, 4, 1, 1.0).with_tasks_per_node(1));
        exec.set_outstanding(3);
        let controller = StrategyController::new();
        controller.tick(&[as_status(&exec)]);
        assert_eq!(exec.take_events(), vec![ScaleEvent::Out(3)]);
    }

    #[test]
    fn scales_in_after_idle_timer_expires() {
        let exec = Arc::new(new_executor(0, 4, 1, 1.0));
        exec.set_blocks(vec![
            BlockStatus { block_id: "b0".into(), state: BlockState::Running },
            BlockStatus { block_id: "b1".into(), state: BlockState::Running },
        ]);
        let controller = StrategyController::new().with_max_idletime(Duration::from_millis(1));
        controller.tick(&[as_status(&exec)]);
        assert!(exec.take_events().is_empty());
        std::thread::sleep(Duration::from_millis(5));
        controller.tick(&[as_status(&exec)]);
        assert_eq!(exec.take_events(), vec![ScaleEvent::In(2, None)]);
    }

    #[test]
    fn does_not_scale_in_below_min_blocks() {
        let exec = Arc::new(new_executor(2, 4, 1, 1.0));
        exec.set_blocks(vec![
            BlockStatus { block_id: "b0".into(), state: BlockState::Running },
            BlockStatus { block_id: "b1".into(), state: BlockState::Running },
        ]);
        let controller = StrategyController::new().with_max_idletime(Duration::from_millis(1));
        controller.tick(&[as_status(&exec)]);
        std::thread::sleep(Duration::from_millis(5));
        controller.tick(&[as_status(&exec)]);
        assert!(exec.take_events().is_empty());
    }

    #[test]
    fn stalled_requests_a_single_block() {
        let exec = Arc::new(new_executor(0, 4, 1, 1.0).with_tasks_per_node(1));
        exec.set_outstanding(2);
        // no blocks at all => active_slots == 0
        let controller = StrategyController::new();
        controller.tick(&[as_status(&exec)]);
        assert_eq!(exec.take_events(), vec![ScaleEvent::Out(1)]);
    }

    #[test]
    fn over_provisioned_drains_one_idle_block() {
        let exec = Arc::new(new_executor(0, 4, 1, 1.0).with_tasks_per_node(1));
        exec.set_blocks(vec![
            BlockStatus { block_id: "b0".into(), state: BlockState::Running },
            BlockStatus { block_id: "b1".into(), state: BlockState::Running },
        ]);
        exec.set_workers(vec![
            dfk_executor::WorkerReport { block_id: "b0".into(), worker_count: 1, active_tasks: 0 },
            dfk_executor::WorkerReport { block_id: "b1".into(), worker_count: 1, active_tasks: 1 },
        ]);
        exec.set_outstanding(1);
        let controller = StrategyController::new();
        controller.tick(&[as_status(&exec)]);
        assert_eq!(
            exec.take_events(),
            vec![ScaleEvent::In(1, Some(vec!["b0".to_string()]))]
        );
    }

    #[test]
    fn non_scaling_executors_are_skipped() {
        use dfk_executor::ThreadPoolExecutor;
        let exec: Arc<dyn ExecutorStatus> = Arc::new(ThreadPoolExecutor::new("local", 1));
        let controller = StrategyController::new();
        // Should simply not panic or do anything.
        controller.tick(&[exec]);
    }
}
