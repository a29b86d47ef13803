// Copyright (c) Dataflow Kernel Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use dfk_types::ConfigurationError;

/// Creates the next numbered run directory under `base` (spec §10.6 "run
/// directory + log file materialization with `runinfo/000` numbering"):
/// `base/000`, `base/001`, ..., picking the first index with no existing
/// directory. Mirrors the original's `make_rundir`, which scans
/// `os.listdir` for the highest existing numeric subdirectory and adds one.
pub fn make_rundir(base: &Path) -> Result<PathBuf, ConfigurationError> {
    fs::create_dir_all(base).map_err(|e| ConfigurationError::RunDirUnavailable {
        path: base.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut highest: Option<u32> = None;
    let entries = fs::read_dir(base).map_err(|e| ConfigurationError::RunDirUnavailable {
        path: base.display().to_string(),
        reason: e.to_string(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfigurationError::RunDirUnavailable {
            path: base.display().to_string(),
            reason: e.to_string(),
        })?;
        if let Some(name) = entry.file_name().to_str() {
            if let Ok(n) = name.parse::<u32>() {
                highest = Some(highest.map_or(n, |h| h.max(n)));
            }
        }
    }

    let next = highest.map_or(0, |h| h + 1);
    let dir = base.join(format!("{next:03}"));
    fs::create_dir_all(&dir).map_err(|e| ConfigurationError::RunDirUnavailable {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    fs::create_dir_all(dir.join("checkpoint")).map_err(|e| ConfigurationError::RunDirUnavailable {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!(run_dir = %dir.display(), "created run directory");
    Ok(dir)
}
