// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! The periodic autoscaling control loop (spec §4.9): for every
//! scaling-enabled executor, decide each tick whether to grow, shrink, or
//! leave its block count alone, based on outstanding tasks versus available
//! slots.
//!
//! This crate only depends on [`dfk_executor`]'s V-independent
//! `ExecutorStatus`/`Provider` traits (spec §9 "Polymorphic executors and
//! providers"): the strategy controller never touches a task's result type.

mod controller;
mod selector;

pub use controller::{StrategyController, DEFAULT_MAX_IDLETIME};
pub use selector::{AllIdleWorkers, LongestRunningBlock, ScaleInSelector};
