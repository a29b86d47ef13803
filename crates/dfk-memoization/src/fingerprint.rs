// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use dfk_types::Fingerprint;

/// Computes a task's fingerprint from its `func_name`, optional `fn_hash`,
/// and the resolved argument value (spec §3: "derived deterministically from
/// func_name, fn_hash (if supplied), and the resolved args/kwargs, ignoring
/// streams, futures, and stdout/stderr").
///
/// `resolved` is expected to already have had futures, streams, and
/// `stdout`/`stderr` kwargs stripped out by the caller (the dependency
/// resolver owns that filtering, since it is the one walking the argument
/// tree); this function only owns turning the remainder into a stable digest.
///
/// The digest is FNV-1a over a canonical serialization rather than a
/// cryptographic hash: fingerprints are a cache key, not a security
/// boundary, and pinning the algorithm ourselves keeps the format stable
/// across Rust toolchain upgrades, which matters because fingerprints are
/// persisted in checkpoint logs and must still match after a restart.
pub fn fingerprint(func_name: &str, fn_hash: Option<&str>, resolved: &serde_json::Value) -> Fingerprint {
    let canonical = serde_json::to_string(resolved).unwrap_or_else(|_| "null".to_string());
    let mut hasher = Fnv1a::new();
    hasher.write(func_name.as_bytes());
    hasher.write(&[0]);
    hasher.write(fn_hash.unwrap_or("").as_bytes());
    hasher.write(&[0]);
    hasher.write(canonical.as_bytes());
    Fingerprint(format!("{:016x}", hasher.finish()))
}

struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Fnv1a(Self::OFFSET_BASIS)
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= *byte as u64;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let a = fingerprint("add_one", None, &json!({"x": 1}));
        let b = fingerprint("add_one", None, &json!({"x": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn different_args_produce_different_fingerprints() {
        let a = fingerprint("add_one", None, &json!({"x": 1}));
        let b = fingerprint("add_one", None, &json!({"x": 2}));
        assert_ne!(a, b);
    }

    #[test]
    fn fn_hash_participates_in_the_digest() {
        let a = fingerprint("add_one", Some("v1"), &json!({"x": 1}));
        let b = fingerprint("add_one", Some("v2"), &json!({"x": 1}));
        assert_ne!(a, b);
    }
}
