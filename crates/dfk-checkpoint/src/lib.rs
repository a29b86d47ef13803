// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! The checkpoint log: an append-only record of completed, memoizable tasks
//! that lets a later run's [`Memoizer`](dfk_memoization::Memoizer) skip
//! re-executing work a previous run already finished (spec §4.8).
//!
//! Checkpointing is split from the kernel proper so it stays testable in
//! isolation: this crate knows nothing about the task registry or the
//! executor pool, only about a stream of [`CheckpointCandidate`]s handed to
//! it by the caller and a directory to read/write.

mod candidate;
mod checkpointer;
mod mode;
mod state;

pub use candidate::CheckpointCandidate;
pub use checkpointer::Checkpointer;
pub use mode::{parse_period, CheckpointMode};
pub use state::KernelState;
