// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `Executor`/`Provider` capability traits (spec §6, §9 "Polymorphic
//! executors and providers"), the block-status vocabulary the strategy
//! controller reasons about, and a concrete thread-pool executor.
//!
//! These traits replace the original's executor/provider inheritance
//! hierarchies with a flat capability set: anything that can `submit`,
//! report `status`, and scale is an `Executor`; anything that can bound
//! blocks is a `Provider`. A type is free to implement both, or to
//! implement `Executor` alone and leave scaling disabled.

mod block;
mod executor_trait;
mod thread_pool;

#[cfg(feature = "testing")]
pub mod testing;

pub use block::{BlockState, BlockStatus, WorkerReport};
pub use executor_trait::{Executor, ExecutorStatus, Provider};
pub use thread_pool::ThreadPoolExecutor;
