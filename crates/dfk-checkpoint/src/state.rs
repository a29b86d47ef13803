// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// The small `kernel.state` file written alongside `tasks.log` on every
/// checkpoint pass (spec §10.6 `runinfo/000` layout). Rewritten wholesale
/// each time, unlike `tasks.log` which is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelState {
    pub run_dir: String,
    pub task_count: u64,
}
