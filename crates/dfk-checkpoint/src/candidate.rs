// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use dfk_types::{Fingerprint, TaskId};

/// One task offered up to [`Checkpointer::checkpoint`](crate::Checkpointer::checkpoint):
/// already-resolved, already-terminal, ready to be appended to the log.
///
/// The caller (the kernel's completion path) is responsible for only ever
/// constructing one of these for a task that is `done()` with no exception
/// and that opted into memoization; `Checkpointer` trusts that filtering and
/// only additionally skips a candidate it has already written (spec §4.8
/// "every task that has been completed yet not checkpointed").
pub struct CheckpointCandidate<V> {
    pub task_id: TaskId,
    pub fingerprint: Fingerprint,
    pub result: V,
}
