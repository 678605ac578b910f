//! Incremental-compilation configuration
//!
//! When the caller opts in, the compiler is configured for file-level
//! incrementality instead of whole-module recompilation. This module owns
//! the incremental working directory layout, keeps classpath snapshots
//! current, and decides when a configuration change forces the compiler to
//! treat the invocation as a full rebuild.
//!
//! Source changes are never computed here: the host build system already
//! tracks input differences at a coarser grain, and tracking them twice
//! would risk inconsistency. The compiler is always told to calculate them.
//!
//! The snapshot cache and the args-hash file are read-then-written without
//! locking; concurrent writers to the same working directory are unsupported
//! and must be serialized by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{DriverError, DriverResult};
use crate::snapshot;
use crate::task::CompilationTask;

const SNAPSHOTS_DIR: &str = "classpath-snapshots";
const SHRUNK_SNAPSHOT_FILE: &str = "shrunk-classpath-snapshot.bin";
const ARGS_HASH_FILE: &str = "args-hash.txt";
const CACHES_DIR: &str = "ic-caches";

/// Path fragments that vary per sandbox or execution root and must not leak
/// into the configuration fingerprint.
const SANDBOX_MARKERS: &[&str] = &["/sandbox/", "processwrapper-", "execroot"];

/// How the compiler should learn about changed sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChanges {
    /// Delegate change detection to the compiler
    ToBeCalculated,
}

/// Everything the service adapter forwards to the compiler when a task runs
/// incrementally.
#[derive(Debug, Clone)]
pub struct IncrementalSettings {
    pub working_dir: PathBuf,
    pub caches_dir: PathBuf,
    pub source_changes: SourceChanges,
    /// Snapshot files for the resolved classpath, in classpath order
    pub dependency_snapshots: Vec<PathBuf>,
    /// Where the compiler writes its merged snapshot of the shrunk classpath
    pub shrunk_snapshot: PathBuf,
    /// Tell the compiler to behave as a full rebuild this invocation
    pub force_recompilation: bool,
}

/// Prepare incremental configuration for a task, or `None` when the task did
/// not opt in. An absent or empty working directory is the opt-out signal:
/// the task silently proceeds as a full compile.
pub fn prepare(
    task: &CompilationTask,
    resolved_classpath: &[PathBuf],
) -> DriverResult<Option<IncrementalSettings>> {
    let working_dir = match &task.directories.incremental_working_dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
        _ => {
            debug!(
                module = %task.module_name,
                "no incremental working directory; falling back to full compile"
            );
            return Ok(None);
        }
    };

    let caches_dir = working_dir.join(CACHES_DIR);
    let snapshots_dir = working_dir.join(SNAPSHOTS_DIR);
    for dir in [&working_dir, &caches_dir, &snapshots_dir] {
        fs::create_dir_all(dir).map_err(|e| DriverError::io(dir, e))?;
    }

    let mut dependency_snapshots = Vec::with_capacity(resolved_classpath.len());
    for entry in resolved_classpath {
        match snapshot::ensure_snapshot(entry, &snapshots_dir) {
            Ok(path) => dependency_snapshots.push(path),
            Err(e) => {
                // A single unsnapshottable entry never aborts the compile;
                // the entry is simply absent from the snapshot set.
                warn!(entry = %entry.display(), error = %e, "skipping classpath snapshot");
            }
        }
    }

    let shrunk_snapshot = working_dir.join(SHRUNK_SNAPSHOT_FILE);
    let force_recompilation = check_fingerprint(task, &working_dir)? || !shrunk_snapshot.exists();

    Ok(Some(IncrementalSettings {
        working_dir,
        caches_dir,
        source_changes: SourceChanges::ToBeCalculated,
        dependency_snapshots,
        shrunk_snapshot,
        force_recompilation,
    }))
}

/// Compare the build-configuration fingerprint against the previous run's and
/// store the current one. Returns `true` when the configuration changed (or
/// was never recorded).
fn check_fingerprint(task: &CompilationTask, working_dir: &Path) -> DriverResult<bool> {
    let current = configuration_fingerprint(task);
    let hash_path = working_dir.join(ARGS_HASH_FILE);

    let previous = fs::read_to_string(&hash_path).ok();
    let changed = previous.as_deref().map(str::trim) != Some(current.as_str());
    if changed {
        debug!(module = %task.module_name, "build configuration fingerprint changed");
    }

    fs::write(&hash_path, &current).map_err(|e| DriverError::io(&hash_path, e))?;
    Ok(changed)
}

/// Hash of the build-relevant configuration: module name, target version,
/// plugin options, passthrough flags. Sandbox-specific fragments are filtered
/// out and the remainder sorted, so the fingerprint is stable across
/// execution roots and argument ordering.
pub fn configuration_fingerprint(task: &CompilationTask) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.push(&task.module_name);
    parts.push(&task.jvm_options.jvm_target);
    parts.extend(
        task.plugin_options
            .iter()
            .map(String::as_str)
            .filter(|s| !is_sandbox_fragment(s)),
    );
    parts.extend(
        task.passthrough_flags
            .iter()
            .map(String::as_str)
            .filter(|s| !is_sandbox_fragment(s)),
    );
    parts.sort_unstable();

    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Substring heuristic for sandbox/execution-root paths. Inherently fragile
/// across hosting environments; the marker list lives here so it can be
/// audited and amended in one place.
fn is_sandbox_fragment(value: &str) -> bool {
    SANDBOX_MARKERS.iter().any(|m| value.contains(m))
}
