// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use dfk_types::{TaskId, TaskSnapshot};
use serde::Serialize;

/// A workflow-level envelope emitted once at kernel construction and once at
/// `cleanup` (spec §10.6 supplemented from the original's monitoring radio:
/// `send_first_message`/`send_last_message` and the `Workflow` table row they
/// populate). Distinct from a `TaskSnapshot`, which is per-task.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInfo {
    pub run_id: String,
    pub run_dir: String,
    pub time_began: DateTime<Utc>,
    pub time_completed: Option<DateTime<Utc>>,
    pub task_count: u64,
}

/// A single task-state transition event, forwarded to a `MonitoringSink` on
/// every status change (spec §4.6 "Emit monitoring record"). Cheap and
/// synchronous by design: `dfk` ships no message-bus transport of its own,
/// only the event shape and the trait a transport would implement.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub snapshot: TaskSnapshot,
}

/// The monitoring collaborator (spec §6 "Monitoring interface (consumed)").
/// A kernel with no sink configured simply never calls these; logging via
/// `tracing` happens unconditionally either way (spec §10.2).
pub trait MonitoringSink: Send + Sync {
    fn workflow_started(&self, info: &WorkflowInfo);
    fn workflow_ended(&self, info: &WorkflowInfo);
    fn task_event(&self, event: &TaskEvent);
}

/// A `MonitoringSink` that logs every event at `tracing::info!` instead of
/// forwarding it anywhere. The default when a `Config` configures no sink;
/// also handy as a smoke-test collaborator.
#[derive(Debug, Default)]
pub struct TracingMonitoringSink;

impl MonitoringSink for TracingMonitoringSink {
    fn workflow_started(&self, info: &WorkflowInfo) {
        tracing::info!(run_id = %info.run_id, run_dir = %info.run_dir, "workflow started");
    }

    fn workflow_ended(&self, info: &WorkflowInfo) {
        tracing::info!(
            run_id = %info.run_id,
            task_count = info.task_count,
            "workflow ended",
        );
    }

    fn task_event(&self, event: &TaskEvent) {
        tracing::debug!(
            task_id = %event.task_id,
            status = %event.snapshot.status,
            "task state transition",
        );
    }
}
