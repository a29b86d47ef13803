// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use dashmap::DashMap;
use dfk_future::Future;
use dfk_types::Fingerprint;

/// The memo table (spec §3 `MemoTable`) plus the `check`/`update` contract
/// the launcher drives around it (spec §4.7).
///
/// `enabled` is the app-wide `Config.app_cache` switch; each call additionally
/// takes the task's own `memoize` opt-in, since either one being off means
/// the table is not consulted for that task (spec §4.7 "Fingerprints for
/// tasks that opt out are either not computed or not inserted" — this crate
/// always computes the fingerprint via `fingerprint()`, but never touches
/// the table for an opted-out task, which is the same externally-visible
/// behavior).
pub struct Memoizer<V>
where
    V: Clone + Send + 'static,
{
    enabled: bool,
    table: DashMap<Fingerprint, Future<V>>,
}

impl<V> Memoizer<V>
where
    V: Clone + Send + 'static,
{
    pub fn new(enabled: bool) -> Self {
        Memoizer {
            enabled,
            table: DashMap::new(),
        }
    }

    /// Seeds the table from checkpoint log entries at kernel start (spec
    /// §4.7 "memo entries are also seeded ... from checkpoint replay").
    /// Seeded entries are available regardless of `enabled`/`memoize`: those
    /// flags gate whether *new* lookups and inserts happen going forward,
    /// not whether a restored result counts.
    pub fn preload(&self, entries: impl IntoIterator<Item = (Fingerprint, Future<V>)>) {
        for (fp, future) in entries {
            self.table.insert(fp, future);
        }
    }

    /// Looks up `fingerprint` in the table, if memoization applies to this
    /// task at all. Returns `Some(future)` on a hit; the caller installs its
    /// usual `update_parent` callback against the returned future exactly as
    /// it would against a freshly-launched executor future.
    pub fn check(&self, task_opted_in: bool, fingerprint: &Fingerprint) -> Option<Future<V>> {
        if !self.enabled || !task_opted_in {
            return None;
        }
        let hit = self.table.get(fingerprint).map(|entry| entry.value().clone());
        if hit.is_some() {
            tracing::debug!(%fingerprint, "memoization hit");
        }
        hit
    }

    /// Records `future` under `fingerprint` once a task's result is known,
    /// provided the task opted in and the result is a successful terminal
    /// value (spec §4.7: failures are never memoized, so a flaky task keeps
    /// retrying on resubmission rather than replaying its failure forever).
    pub fn update(&self, task_opted_in: bool, fingerprint: Fingerprint, future: Future<V>) {
        if !self.enabled || !task_opted_in {
            return;
        }
        if !future.done() || future.exception().is_some() {
            return;
        }
        tracing::debug!(%fingerprint, "memoization insert");
        self.table.insert(fingerprint, future);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfk_types::TaskError;

    #[test]
    fn miss_when_not_opted_in() {
        let memo: Memoizer<i32> = Memoizer::new(true);
        let fp = Fingerprint("abc".into());
        let fut: Future<i32> = Future::new();
        fut.set_result(1).unwrap();
        memo.update(false, fp.clone(), fut);
        assert!(memo.check(true, &fp).is_none());
        assert!(memo.is_empty());
    }

    #[test]
    fn miss_when_globally_disabled() {
        let memo: Memoizer<i32> = Memoizer::new(false);
        let fp = Fingerprint("abc".into());
        let fut: Future<i32> = Future::new();
        fut.set_result(1).unwrap();
        memo.update(true, fp.clone(), fut);
        assert!(memo.check(true, &fp).is_none());
    }

    #[test]
    fn hit_after_successful_update() {
        let memo: Memoizer<i32> = Memoizer::new(true);
        let fp = Fingerprint("abc".into());
        let fut: Future<i32> = Future::new();
        fut.set_result(5).unwrap();
        memo.update(true, fp.clone(), fut);
        let hit = memo.check(true, &fp).expect("should hit");
        assert_eq!(hit.result().unwrap(), 5);
    }

    #[test]
    fn failed_result_is_never_memoized() {
        let memo: Memoizer<i32> = Memoizer::new(true);
        let fp = Fingerprint("abc".into());
        let fut: Future<i32> = Future::new();
        fut.set_exception(TaskError::Execution("boom".into())).unwrap();
        memo.update(true, fp.clone(), fut);
        assert!(memo.check(true, &fp).is_none());
    }

    #[test]
    fn preload_entries_are_visible_regardless_of_opt_in_flags_at_lookup_time() {
        let memo: Memoizer<i32> = Memoizer::new(true);
        let fp = Fingerprint("from-checkpoint".into());
        let fut: Future<i32> = Future::new();
        fut.set_result(42).unwrap();
        memo.preload([(fp.clone(), fut)]);
        assert_eq!(memo.check(true, &fp).unwrap().result().unwrap(), 42);
    }
}
