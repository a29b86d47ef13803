// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared vocabulary for the dataflow kernel.
//!
//! This crate defines the types that cross module boundaries: the task id
//! space, the task lifecycle state machine, the task record itself, the
//! checkpoint record shapes, and the error taxonomy. It has no behavior of
//! its own; everything here is data that `dfk-future`, `dfk-memoization`,
//! `dfk-checkpoint`, `dfk-executor`, `dfk-strategy`, and `dfk` build on.

mod error;
mod record;
mod status;

pub use error::{
    BadCheckpoint, ConfigurationError, DependencyError, DuplicateTaskError, RemoteExceptionWrapper,
    TaskError,
};
pub use record::{Fingerprint, TaskId, TaskSnapshot};
pub use status::{Status, FINAL_FAILURE_STATES, FINAL_STATES};

/// A fixed fingerprint placeholder used before a task's first memo probe.
///
/// `TaskRecord::hashsum` starts as `None`; the memoizer populates it lazily
/// on the first `check` call per §4.7, caching it on the record so a retry
/// does not recompute it.
pub type OptionalFingerprint = Option<Fingerprint>;
