// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// When the kernel writes to the checkpoint log (spec §4.8 `Config.checkpoint_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    /// Never checkpoint.
    Off,
    /// Checkpoint the single task that just finished, inline on its
    /// completion path.
    TaskExit,
    /// Checkpoint everything outstanding on a fixed timer.
    Periodic(Duration),
    /// Only ever checkpoint when the caller explicitly asks for it.
    Manual,
}

/// Parses a `HH:MM:SS` checkpoint period. Falls back to 30 minutes and logs
/// a warning on any parse failure, matching the original's behavior of never
/// letting a malformed config value prevent the kernel from starting (spec
/// §10.6).
pub fn parse_period(raw: &str) -> Duration {
    const FALLBACK: Duration = Duration::from_secs(30 * 60);

    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        tracing::error!(raw, "invalid checkpoint_period, expected HH:MM:SS; falling back to 30m");
        return FALLBACK;
    }
    let parsed: Option<(u64, u64, u64)> = (|| {
        Some((
            parts[0].parse().ok()?,
            parts[1].parse().ok()?,
            parts[2].parse().ok()?,
        ))
    })();
    match parsed {
        Some((h, m, s)) => Duration::from_secs(h * 3600 + m * 60 + s),
        None => {
            tracing::error!(raw, "invalid checkpoint_period, expected HH:MM:SS; falling back to 30m");
            FALLBACK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_period() {
        assert_eq!(parse_period("01:30:00"), Duration::from_secs(5400));
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(parse_period("not-a-duration"), Duration::from_secs(1800));
    }

    #[test]
    fn falls_back_on_wrong_field_count() {
        assert_eq!(parse_period("01:30"), Duration::from_secs(1800));
    }
}
