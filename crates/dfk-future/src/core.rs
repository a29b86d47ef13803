// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dfk_types::TaskError;
use parking_lot::{Condvar, Mutex};

type Outcome<T> = Result<T, TaskError>;
type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

enum State<T> {
    Pending(Vec<Callback<T>>),
    Done(Outcome<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
    /// Set by the launcher when an executor future is created, consulted by
    /// `AppFuture`'s parent-mirroring callback to decide whether a failure
    /// is final. Futures that are not retry-aware (e.g. memo hits) leave
    /// this at its default of 0, which reads as "this is the final attempt".
    retries_left: AtomicI64,
}

/// Returned when a second `set_result`/`set_exception` call races the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadySet;

impl std::fmt::Display for AlreadySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("future was already set; a future may only be completed once")
    }
}

impl std::error::Error for AlreadySet {}

/// A single-assignment result cell with one-shot completion callbacks (spec
/// §4.1). Cloning a `Future` shares the same underlying cell.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Future<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Future {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending(Vec::new())),
                condvar: Condvar::new(),
                retries_left: AtomicI64::new(0),
            }),
        }
    }

    /// Resolves this future with a successful value. First writer wins; a
    /// second call (from any source, including a racing `set_exception`)
    /// returns `Err(AlreadySet)` and has no effect.
    pub fn set_result(&self, value: T) -> Result<(), AlreadySet> {
        self.complete(Ok(value))
    }

    /// Resolves this future with an error. See `set_result` for the
    /// first-writer-wins contract.
    pub fn set_exception(&self, err: TaskError) -> Result<(), AlreadySet> {
        self.complete(Err(err))
    }

    fn complete(&self, outcome: Outcome<T>) -> Result<(), AlreadySet> {
        let callbacks = {
            let mut state = self.shared.state.lock();
            let cbs = match &mut *state {
                State::Done(_) => return Err(AlreadySet),
                State::Pending(cbs) => std::mem::take(cbs),
            };
            *state = State::Done(outcome.clone());
            cbs
        };
        self.shared.condvar.notify_all();
        for cb in callbacks {
            run_callback_safely(cb, outcome.clone());
        }
        Ok(())
    }

    pub fn done(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Done(_))
    }

    /// Blocks until the future is done, then returns the value or
    /// re-raises the error (spec §4.1: "blocks; surfaces error").
    pub fn result(&self) -> Outcome<T> {
        let mut state = self.shared.state.lock();
        loop {
            match &*state {
                State::Done(outcome) => return outcome.clone(),
                State::Pending(_) => self.shared.condvar.wait(&mut state),
            }
        }
    }

    /// Blocks until the future is done, then returns the error, or `None`
    /// on success. Never panics/reraises, unlike `result()`.
    pub fn exception(&self) -> Option<TaskError> {
        self.result().err()
    }

    /// Registers a callback to run exactly once, when this future becomes
    /// done. If the future is already done, the callback fires inline
    /// (spec §9 "callback storms"/"arm and probe").
    pub fn add_callback<F>(&self, cb: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Done(outcome) => {
                let outcome = outcome.clone();
                drop(state);
                run_callback_safely(Box::new(cb), outcome);
            }
            State::Pending(cbs) => {
                cbs.push(Box::new(cb));
            }
        }
    }

    pub fn retries_left(&self) -> i64 {
        self.shared.retries_left.load(Ordering::SeqCst)
    }

    pub fn set_retries_left(&self, n: i64) {
        self.shared.retries_left.store(n, Ordering::SeqCst);
    }
}

/// Runs a completion callback, logging and swallowing any panic rather than
/// letting it unwind into kernel state (spec §4.1 "Callback failures are
/// logged but must not propagate into the kernel").
fn run_callback_safely<T>(cb: Callback<T>, outcome: Outcome<T>) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(outcome)));
    if let Err(panic) = result {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::warn!(panic = %msg, "future completion callback panicked; ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn set_result_then_result_returns_value() {
        let fut: Future<i32> = Future::new();
        fut.set_result(42).unwrap();
        assert_eq!(fut.result().unwrap(), 42);
        assert!(fut.done());
    }

    #[test]
    fn second_set_is_an_error() {
        let fut: Future<i32> = Future::new();
        fut.set_result(1).unwrap();
        assert_eq!(fut.set_result(2), Err(AlreadySet));
        assert_eq!(fut.result().unwrap(), 1);
    }

    #[test]
    fn exception_returns_error_without_panicking() {
        let fut: Future<i32> = Future::new();
        fut.set_exception(TaskError::Execution("boom".into())).unwrap();
        assert!(fut.exception().is_some());
    }

    #[test]
    fn callback_fires_once_after_set() {
        let fut: Future<i32> = Future::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        fut.add_callback(move |res| {
            assert_eq!(res.unwrap(), 7);
            fired2.store(true, Ordering::SeqCst);
        });
        assert!(!fired.load(Ordering::SeqCst));
        fut.set_result(7).unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn callback_added_after_completion_fires_inline() {
        let fut: Future<i32> = Future::new();
        fut.set_result(9).unwrap();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        fut.add_callback(move |res| {
            assert_eq!(res.unwrap(), 9);
            fired2.store(true, Ordering::SeqCst);
        });
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn a_panicking_callback_does_not_poison_the_future() {
        let fut: Future<i32> = Future::new();
        fut.add_callback(|_| panic!("callback blew up"));
        fut.set_result(1).unwrap();
        assert_eq!(fut.result().unwrap(), 1);
    }

    #[test]
    fn result_blocks_until_set_from_another_thread() {
        let fut: Future<i32> = Future::new();
        let setter = fut.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set_result(5).unwrap();
        });
        assert_eq!(fut.result().unwrap(), 5);
        handle.join().unwrap();
    }
}
