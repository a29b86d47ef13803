// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! `Future<T>` and `AppFuture<T, O>`: the single-assignment cells the rest of
//! the kernel is built on (spec §4.1).
//!
//! `Future<T>` is a cheap-to-clone handle (an `Arc` around a mutex-guarded
//! state machine) that can be set exactly once, either with a value or with
//! an error, and that runs any callbacks registered on it exactly once, in
//! either order relative to the set. `AppFuture<T, O>` is the caller-visible
//! future for one submitted task: it adds the output-file future sequence
//! and the rebindable `parent` link used to mirror an executor future's (or
//! a synthesized retry/dependency-failure future's) outcome.

mod app_future;
mod core;

pub use app_future::{AppFuture, UpdateParentError};
pub use core::{AlreadySet, Future};
