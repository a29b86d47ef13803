// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use dashmap::DashSet;
use dfk_future::Future;
use dfk_types::{BadCheckpoint, Fingerprint, TaskId};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::candidate::CheckpointCandidate;
use crate::mode::CheckpointMode;
use crate::state::KernelState;

const TASKS_LOG: &str = "tasks.log";
const KERNEL_STATE: &str = "kernel.state";

#[derive(Serialize, Deserialize)]
struct LogRecord<V> {
    hash: Fingerprint,
    result: V,
}

/// Owns one run's `checkpoint/` directory: a `kernel.state` summary and an
/// append-only `tasks.log` of completed, memoized task results (spec §4.8,
/// §10.6). Safe to share across threads; `checkpoint()` serializes itself
/// internally so concurrent callers (a periodic timer firing alongside a
/// manual `dfk.checkpoint()` call) don't interleave writes.
pub struct Checkpointer<V> {
    mode: CheckpointMode,
    dir: PathBuf,
    lock: Mutex<()>,
    already_checkpointed: DashSet<TaskId>,
    total_checkpointed: std::sync::atomic::AtomicU64,
    _marker: std::marker::PhantomData<fn() -> V>,
}

impl<V> Checkpointer<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    pub fn new(run_dir: impl Into<PathBuf>, mode: CheckpointMode) -> Self {
        Checkpointer {
            mode,
            dir: run_dir.into().join("checkpoint"),
            lock: Mutex::new(()),
            already_checkpointed: DashSet::new(),
            total_checkpointed: std::sync::atomic::AtomicU64::new(0),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn mode(&self) -> CheckpointMode {
        self.mode
    }

    pub fn total_checkpointed(&self) -> u64 {
        self.total_checkpointed.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Appends every not-yet-written candidate to `tasks.log` and rewrites
    /// `kernel.state`. Returns the checkpoint directory on success (spec
    /// §4.8 "Returns: Checkpoint dir if checkpoints were written
    /// successfully").
    pub fn checkpoint(
        &self,
        candidates: impl IntoIterator<Item = CheckpointCandidate<V>>,
        task_count: u64,
        run_dir_label: &str,
    ) -> Result<PathBuf, BadCheckpoint> {
        let _guard = self.lock.lock();

        fs::create_dir_all(&self.dir).map_err(|e| BadCheckpoint::Unreadable(
            self.dir.display().to_string(),
            e.to_string(),
        ))?;

        let state = KernelState {
            run_dir: run_dir_label.to_string(),
            task_count,
        };
        let state_path = self.dir.join(KERNEL_STATE);
        let state_json = serde_json::to_string(&state).expect("KernelState is always serializable");
        fs::write(&state_path, state_json).map_err(|e| {
            BadCheckpoint::Unreadable(state_path.display().to_string(), e.to_string())
        })?;

        let log_path = self.dir.join(TASKS_LOG);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| BadCheckpoint::Unreadable(log_path.display().to_string(), e.to_string()))?;

        let mut count = 0u64;
        for candidate in candidates {
            if !self.already_checkpointed.insert(candidate.task_id) {
                continue;
            }
            let record = LogRecord {
                hash: candidate.fingerprint,
                result: candidate.result,
            };
            let mut line = serde_json::to_vec(&record)
                .map_err(|e| BadCheckpoint::Corrupt(log_path.display().to_string(), e.to_string()))?;
            line.push(b'\n');
            file.write_all(&line)
                .map_err(|e| BadCheckpoint::Unreadable(log_path.display().to_string(), e.to_string()))?;
            file.sync_data()
                .map_err(|e| BadCheckpoint::Unreadable(log_path.display().to_string(), e.to_string()))?;
            count += 1;
            tracing::debug!(task_id = %candidate.task_id, "task checkpointed");
        }

        if count == 0 {
            if self.total_checkpointed() == 0 {
                tracing::warn!("no tasks checkpointed so far in this run; ensure caching is enabled");
            } else {
                tracing::debug!("no tasks checkpointed in this pass");
            }
        } else {
            tracing::info!(count, "done checkpointing tasks");
        }
        self.total_checkpointed
            .fetch_add(count, std::sync::atomic::Ordering::SeqCst);

        Ok(self.dir.clone())
    }

    /// Reloads one or more prior run's `tasks.log` files into
    /// fingerprint -> future pairs suitable for
    /// [`Memoizer::preload`](dfk_memoization::Memoizer::preload) (the
    /// `Memoizer` binding happens in the caller, this crate doesn't depend
    /// on `dfk-memoization` to avoid a cycle).
    ///
    /// A line that fails to parse and is *not* the last line in the file is
    /// a corrupt log and is rejected outright. A malformed last line is
    /// treated as a torn write from a crash mid-append and is silently
    /// dropped, matching the original's `EOFError`-terminates-the-loop
    /// tolerance for a pickle stream that stops mid-record.
    pub fn load(checkpoint_dirs: &[PathBuf]) -> Result<Vec<(Fingerprint, Future<V>)>, BadCheckpoint> {
        let mut loaded = Vec::new();
        for dir in checkpoint_dirs {
            let log_path = dir.join(TASKS_LOG);
            tracing::info!(dir = %dir.display(), "loading checkpoints");

            let file = File::open(&log_path).map_err(|_| {
                BadCheckpoint::MissingLog(log_path.display().to_string())
            })?;
            let reader = BufReader::new(file);
            let lines: Vec<String> = reader
                .lines()
                .collect::<Result<_, _>>()
                .map_err(|e| BadCheckpoint::Unreadable(log_path.display().to_string(), e.to_string()))?;

            let mut entries_this_dir = 0usize;
            for (i, line) in lines.iter().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogRecord<V>>(line) {
                    Ok(record) => {
                        let future = Future::new();
                        let _ = future.set_result(record.result);
                        loaded.push((record.hash, future));
                        entries_this_dir += 1;
                    }
                    Err(e) if i + 1 == lines.len() => {
                        tracing::warn!(
                            dir = %dir.display(),
                            error = %e,
                            "truncated tail in checkpoint log, ignoring partial record",
                        );
                    }
                    Err(e) => {
                        return Err(BadCheckpoint::Corrupt(log_path.display().to_string(), e.to_string()));
                    }
                }
            }
            tracing::info!(dir = %dir.display(), entries = entries_this_dir, "completed loading checkpoint");
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfk_types::TaskId;
    use tempfile::tempdir;

    #[test]
    fn checkpoint_then_load_round_trips_a_value() {
        let dir = tempdir().unwrap();
        let ckpt: Checkpointer<i32> = Checkpointer::new(dir.path(), CheckpointMode::Manual);
        let fp = Fingerprint("abc".into());
        let path = ckpt
            .checkpoint(
                [CheckpointCandidate { task_id: TaskId(0), fingerprint: fp.clone(), result: 7 }],
                1,
                "runinfo/000",
            )
            .unwrap();
        assert_eq!(path, dir.path().join("checkpoint"));

        let loaded: Vec<(Fingerprint, Future<i32>)> = Checkpointer::<i32>::load(&[path]).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, fp);
        assert_eq!(loaded[0].1.result().unwrap(), 7);
    }

    #[test]
    fn a_task_is_never_checkpointed_twice() {
        let dir = tempdir().unwrap();
        let ckpt: Checkpointer<i32> = Checkpointer::new(dir.path(), CheckpointMode::Manual);
        let fp = Fingerprint("abc".into());
        let candidate = || CheckpointCandidate { task_id: TaskId(0), fingerprint: fp.clone(), result: 7 };
        ckpt.checkpoint([candidate()], 1, "runinfo/000").unwrap();
        ckpt.checkpoint([candidate()], 1, "runinfo/000").unwrap();
        assert_eq!(ckpt.total_checkpointed(), 1);
    }

    #[test]
    fn missing_log_file_is_a_bad_checkpoint() {
        let dir = tempdir().unwrap();
        let err = Checkpointer::<i32>::load(&[dir.path().join("checkpoint")]).unwrap_err();
        assert!(matches!(err, BadCheckpoint::MissingLog(_)));
    }

    #[test]
    fn truncated_final_line_is_tolerated() {
        let dir = tempdir().unwrap();
        let ckpt_dir = dir.path().join("checkpoint");
        fs::create_dir_all(&ckpt_dir).unwrap();
        let log_path = ckpt_dir.join(TASKS_LOG);
        let mut f = File::create(&log_path).unwrap();
        writeln!(f, r#"{{"hash":"a","result":1}}"#).unwrap();
        write!(f, r#"{{"hash":"b","resul"#).unwrap();

        let loaded = Checkpointer::<i32>::load(&[ckpt_dir]).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, Fingerprint("a".into()));
    }
}
