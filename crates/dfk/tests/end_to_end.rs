// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios from the kernel's functional specification (spec
//! §8 "End-to-end scenarios"), exercised against a real `DataFlowKernel`
//! rather than any individual subsystem in isolation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dfk::{Arg, CheckpointMode, Config, DataFlowKernel, ExecutorSelection, Status, Value};
use dfk_executor::testing::RecordingExecutor;
use dfk_executor::{Executor, ThreadPoolExecutor};

fn kernel_with_threadpool(run_dir: &std::path::Path, retries: u32, lazy_errors: bool) -> DataFlowKernel {
    let exec: Arc<dyn Executor<Value>> = Arc::new(ThreadPoolExecutor::new("local", 4));
    let config = Config::builder()
        .executor(exec)
        .run_dir(run_dir)
        .retries(retries)
        .lazy_errors(lazy_errors)
        .build()
        .unwrap();
    DataFlowKernel::new(config).unwrap()
}

fn add_one(args: &[Value]) -> Result<Value, String> {
    let n = args[0].as_i64().ok_or("not an integer")?;
    Ok(Value::from(n + 1))
}

/// Scenario 1: linear chain, success.
#[test]
fn linear_chain_of_three_tasks_completes_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 0, true);

    let a = kernel
        .submit("f", None, false, "local", vec![Arg::Value(Value::from(1))], vec![], add_one)
        .unwrap();
    let b = kernel
        .submit("g", None, false, "local", vec![Arg::from(&a)], vec![], add_one)
        .unwrap();
    let c = kernel
        .submit("h", None, false, "local", vec![Arg::from(&b)], vec![], add_one)
        .unwrap();

    assert_eq!(c.result().unwrap(), Value::from(4));
    assert_eq!(a.status(), Status::Done);
    assert_eq!(b.status(), Status::Done);
    assert_eq!(c.status(), Status::Done);

    kernel.cleanup().unwrap();
}

/// Scenario 2: diamond dependency graph, parallel launch.
///
/// `b` and `c` both depend only on `a` and have no dependency on each
/// other; with a 4-worker thread pool they must run concurrently, so total
/// wall time is ~2 sleeps, not 3.
#[test]
fn diamond_dependencies_launch_in_parallel() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 0, true);

    fn slow_double(args: &[Value]) -> Result<Value, String> {
        thread::sleep(Duration::from_millis(300));
        let n = args[0].as_i64().ok_or("not an integer")?;
        Ok(Value::from(n * 2))
    }

    fn sum_two(args: &[Value]) -> Result<Value, String> {
        let x = args[0].as_i64().ok_or("not an integer")?;
        let y = args[1].as_i64().ok_or("not an integer")?;
        Ok(Value::from(x + y))
    }

    let start = Instant::now();
    let a = kernel
        .submit("f", None, false, "local", vec![Arg::Value(Value::from(1))], vec![], slow_double)
        .unwrap();
    let b = kernel
        .submit("g", None, false, "local", vec![Arg::from(&a)], vec![], slow_double)
        .unwrap();
    let c = kernel
        .submit("h", None, false, "local", vec![Arg::from(&a)], vec![], slow_double)
        .unwrap();
    let d = kernel
        .submit("k", None, false, "local", vec![Arg::from(&b), Arg::from(&c)], vec![], sum_two)
        .unwrap();

    assert_eq!(d.result().unwrap(), Value::from(8));
    // a: 1*2=2; b=c=2*2=4; d=4+4=8. Two sequential 300ms stages if b/c
    // overlap, three if they don't: budget generously under 3x a single
    // stage to prove overlap without being a flaky timing test.
    assert!(start.elapsed() < Duration::from_millis(300 * 3 - 50));

    kernel.cleanup().unwrap();
}

/// Scenario 3: a dependency failure propagates as `DependencyError` and
/// never hangs the graph.
#[test]
fn dependency_failure_propagates_as_dep_fail() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 0, true);

    fn always_fails(_args: &[Value]) -> Result<Value, String> {
        Err("boom".to_string())
    }

    let a = kernel.submit("raise_e", None, false, "local", vec![], vec![], always_fails).unwrap();
    let b = kernel
        .submit("f", None, false, "local", vec![Arg::from(&a)], vec![], add_one)
        .unwrap();

    let err = b.exception().expect("b must fail");
    let dep_err = err.as_dependency_error().expect("b's error must be a DependencyError");
    assert_eq!(dep_err.task_id, b.id());
    assert_eq!(dep_err.causes.len(), 1);
    assert!(dep_err.causes[0].to_string().contains("boom"));

    assert_eq!(b.status(), Status::DepFail);
    assert_eq!(a.status(), Status::Failed);

    kernel.cleanup().unwrap();
}

/// Scenario 4: retry on transient error, both with retries enabled and
/// with eager (non-lazy) failure.
#[test]
fn retry_succeeds_within_budget_then_recovers() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 2, true);

    let attempt = Arc::new(AtomicU32::new(0));
    let attempt_for_app = Arc::clone(&attempt);
    let app = move |_args: &[Value]| -> Result<Value, String> {
        let n = attempt_for_app.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            Err(format!("transient failure #{n}"))
        } else {
            Ok(Value::from(42))
        }
    };

    let handle = kernel.submit("flaky", None, false, "local", vec![], vec![], app).unwrap();
    assert_eq!(handle.result().unwrap(), Value::from(42));
    assert_eq!(handle.fail_count(), 2);
    assert_eq!(handle.fail_history().len(), 2);
    assert_eq!(handle.status(), Status::Done);

    kernel.cleanup().unwrap();
}

#[test]
fn eager_mode_fails_permanently_after_the_first_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 2, false);

    fn always_fails(_args: &[Value]) -> Result<Value, String> {
        Err("boom".to_string())
    }

    let handle = kernel.submit("flaky", None, false, "local", vec![], vec![], always_fails).unwrap();
    assert!(handle.exception().is_some());
    assert_eq!(handle.status(), Status::Failed);
    assert_eq!(handle.fail_count(), 1);

    kernel.cleanup().unwrap();
}

/// Scenario 5: memoization hit — the second identical submission never
/// reaches the executor.
#[test]
fn identical_memoized_submissions_hit_the_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let recording = Arc::new(RecordingExecutor::new("local"));
    let exec: Arc<dyn Executor<Value>> = recording.clone();
    let config = Config::builder()
        .executor(exec)
        .run_dir(tmp.path())
        .app_cache(true)
        .build()
        .unwrap();
    let kernel = DataFlowKernel::new(config).unwrap();

    fn identity(args: &[Value]) -> Result<Value, String> {
        Ok(args[0].clone())
    }

    let first = kernel
        .submit("f", None, true, "local", vec![Arg::Value(Value::from(1))], vec![], identity)
        .unwrap();
    assert_eq!(first.result().unwrap(), Value::from(1));
    assert_eq!(recording.call_count(), 1);

    let second = kernel
        .submit("f", None, true, "local", vec![Arg::Value(Value::from(1))], vec![], identity)
        .unwrap();
    assert_eq!(second.result().unwrap(), Value::from(1));
    assert_eq!(recording.call_count(), 1, "the memo hit must not reach the executor");

    kernel.cleanup().unwrap();
}

/// Scenario 6: checkpoint survives a kernel restart.
#[test]
fn checkpoint_survives_restart_as_a_memo_hit() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("run0");

    fn identity(args: &[Value]) -> Result<Value, String> {
        Ok(args[0].clone())
    }

    let checkpoint_dir = {
        let exec: Arc<dyn Executor<Value>> = Arc::new(ThreadPoolExecutor::new("local", 2));
        let config = Config::builder()
            .executor(exec)
            .run_dir(&run_dir)
            .app_cache(true)
            .checkpoint_mode(CheckpointMode::Manual)
            .build()
            .unwrap();
        let kernel = DataFlowKernel::new(config).unwrap();

        let handle = kernel
            .submit("f", None, true, "local", vec![Arg::Value(Value::from(1))], vec![], identity)
            .unwrap();
        assert_eq!(handle.result().unwrap(), Value::from(1));
        let dir = kernel.checkpoint().unwrap();
        kernel.cleanup().unwrap();
        dir
    };

    let recording = Arc::new(RecordingExecutor::new("local"));
    let exec: Arc<dyn Executor<Value>> = recording.clone();
    let config = Config::builder()
        .executor(exec)
        .run_dir(tmp.path().join("run1"))
        .app_cache(true)
        .checkpoint_files(vec![checkpoint_dir])
        .build()
        .unwrap();
    let kernel = DataFlowKernel::new(config).unwrap();

    let handle = kernel
        .submit("f", None, true, "local", vec![Arg::Value(Value::from(1))], vec![], identity)
        .unwrap();
    assert_eq!(handle.result().unwrap(), Value::from(1));
    assert_eq!(recording.call_count(), 0, "a preloaded checkpoint must short-circuit the executor");

    kernel.cleanup().unwrap();
}

/// Executor selection (spec §4.5): `'all'` draws uniformly from every
/// configured non-staging executor, and the choice is fixed across retries.
#[test]
fn executor_selection_all_distributes_across_executors() {
    let tmp = tempfile::tempdir().unwrap();
    let a = Arc::new(RecordingExecutor::new("a"));
    let b = Arc::new(RecordingExecutor::new("b"));
    let exec_a: Arc<dyn Executor<Value>> = a.clone();
    let exec_b: Arc<dyn Executor<Value>> = b.clone();
    let config = Config::builder()
        .executor(exec_a)
        .executor(exec_b)
        .run_dir(tmp.path())
        .build()
        .unwrap();
    let kernel = DataFlowKernel::new(config).unwrap();

    fn identity(args: &[Value]) -> Result<Value, String> {
        Ok(args[0].clone())
    }

    for i in 0..40 {
        kernel
            .submit("f", None, false, ExecutorSelection::All, vec![Arg::Value(Value::from(i))], vec![], identity)
            .unwrap()
            .result()
            .unwrap();
    }

    assert_eq!(a.call_count() + b.call_count(), 40);
    assert!(a.call_count() > 0 && b.call_count() > 0, "both executors must have been chosen at least once across 40 draws");

    kernel.cleanup().unwrap();
}

/// A task's `outputs=` remote files resolve to staged-out futures on its
/// `AppFuture` once the task completes (spec §3 "an AppFuture ... owns an
/// ordered sequence of output-file futures"; spec §4.6 "for each output
/// file that is remote, issue a `stage_out` request").
#[test]
fn remote_outputs_resolve_once_the_task_completes() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 0, true);

    fn identity(args: &[Value]) -> Result<Value, String> {
        Ok(args[0].clone())
    }

    let handle = kernel
        .submit(
            "f",
            None,
            false,
            "local",
            vec![Arg::Value(Value::from(1))],
            vec![dfk::RemoteFile::remote("/out/result.txt")],
            identity,
        )
        .unwrap();

    let outputs = handle.app_future().outputs();
    assert_eq!(outputs.len(), 1);

    assert_eq!(handle.result().unwrap(), Value::from(1));
    assert_eq!(outputs[0].result().unwrap(), Value::String("/out/result.txt".into()));

    kernel.cleanup().unwrap();
}

/// `cleanup()` is idempotent-guarded: a second call is an error, not a
/// silent no-op or a panic (spec §5 "Shutdown").
#[test]
fn a_second_cleanup_call_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 0, true);
    kernel.cleanup().unwrap();
    assert!(kernel.cleanup().is_err());
}

/// A submission after `cleanup()` is rejected rather than silently accepted
/// into a kernel that has already torn down its executors.
#[test]
fn submitting_after_cleanup_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let kernel = kernel_with_threadpool(tmp.path(), 0, true);
    kernel.cleanup().unwrap();
    let err = kernel
        .submit("f", None, false, "local", vec![Arg::Value(Value::from(1))], vec![], add_one)
        .unwrap_err();
    assert!(matches!(err, dfk::ConfigurationError::AlreadyCleanedUp));
}
