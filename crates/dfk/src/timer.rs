// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// A named background thread that runs a closure on a fixed period until
/// told to stop (spec §4.8 "periodic" checkpoint mode, §4.9 "a periodic
/// control loop invoked by a timer", §5 "the strategy timer and the
/// checkpoint timer are stopped cooperatively on shutdown").
///
/// Built on `recv_timeout` rather than `thread::sleep` plus an `AtomicBool`
/// so `stop` returns as soon as the signal is sent instead of waiting out
/// whatever fraction of the period remains.
pub(crate) struct PeriodicTimer {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    pub fn spawn(name: &str, period: Duration, mut tick: impl FnMut() + Send + 'static) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => tick(),
                }
            })
            .expect("failed to spawn timer thread");
        PeriodicTimer { stop_tx, handle: Some(handle) }
    }

    /// Signals the thread to stop and blocks until it has exited.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
