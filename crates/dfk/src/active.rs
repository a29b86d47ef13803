// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::kernel::DataFlowKernel;

/// The process-wide "currently active" kernel (spec §9 design note: "apps
/// decorated at module scope call into whichever kernel is currently
/// loaded, rather than taking one as an explicit argument"). Optional: a
/// caller that threads its `Arc<DataFlowKernel>` through explicitly never
/// has to touch this at all.
static ACTIVE: Lazy<Mutex<Option<Arc<DataFlowKernel>>>> = Lazy::new(|| Mutex::new(None));

/// Errors from interacting with the process-wide active kernel (spec §9).
#[derive(Debug, thiserror::Error, Clone)]
pub enum ActiveKernelError {
    /// Mirrors the original's `RuntimeError` guard in `DataFlowKernelLoader.load`:
    /// a second `load` without an intervening `clear` is almost always a bug
    /// (two kernels racing to own the same in-flight apps), so it is
    /// rejected rather than silently replacing the first.
    #[error("a dataflow kernel is already loaded; call clear() before loading another")]
    AlreadyLoaded,
    #[error("no dataflow kernel is currently loaded")]
    NotLoaded,
}

/// Installs `kernel` as the process-wide active kernel (spec §9
/// `DataFlowKernelLoader.load`). Fails if one is already loaded.
pub fn load(kernel: Arc<DataFlowKernel>) -> Result<(), ActiveKernelError> {
    let mut slot = ACTIVE.lock();
    if slot.is_some() {
        return Err(ActiveKernelError::AlreadyLoaded);
    }
    *slot = Some(kernel);
    Ok(())
}

/// Returns the process-wide active kernel (spec §9 `DataFlowKernelLoader.dfk`).
pub fn current() -> Result<Arc<DataFlowKernel>, ActiveKernelError> {
    ACTIVE.lock().clone().ok_or(ActiveKernelError::NotLoaded)
}

/// Clears the process-wide active kernel, returning whatever was loaded, if
/// anything (spec §9 `DataFlowKernelLoader.clear`). Does not call
/// `cleanup()` on the returned kernel: that remains the caller's call, same
/// as the original leaves `dfk.cleanup()` to the caller before `clear()`.
pub fn clear() -> Option<Arc<DataFlowKernel>> {
    ACTIVE.lock().take()
}
