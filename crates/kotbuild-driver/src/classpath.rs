//! Compile-classpath resolution
//!
//! In reduced mode the compiler sees only the declared direct dependencies
//! plus the declared entries prior dependency-usage reports marked as
//! explicitly used; everything else stays off the classpath so unrelated
//! transitive changes do not retrigger compilation. The result is always a
//! subset of the declared classpath: a report can never add a jar the host
//! build system did not declare for this task. Full mode passes the
//! declared classpath through unchanged. Either way the module's own
//! generated-classes directory is appended so a prior annotation-processing
//! round's output is visible to the main compile.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::deps::DependencyUsageReport;
use crate::task::CompilationTask;

/// Load prior usage reports, treating each unreadable or malformed report as
/// empty. The affected dependency simply contributes nothing; if it was
/// declared direct it stays on the classpath regardless.
pub fn load_reports(paths: &[PathBuf]) -> Vec<DependencyUsageReport> {
    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        match DependencyUsageReport::read(path) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!(report = %path.display(), error = %e, "ignoring unreadable dependency report");
            }
        }
    }
    reports
}

/// Compute the classpath handed to the compiler.
pub fn resolve(task: &CompilationTask, reports: &[DependencyUsageReport]) -> Vec<PathBuf> {
    let mut resolved = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut push = |entry: &Path, resolved: &mut Vec<PathBuf>| {
        if seen.insert(entry.to_path_buf()) {
            resolved.push(entry.to_path_buf());
        }
    };

    if task.reduced_classpath_mode {
        for entry in &task.classpath.direct {
            push(entry, &mut resolved);
        }
        // Reports may be stale or written against another dependency graph;
        // only entries the host build system declared for this task count.
        let declared: HashSet<&PathBuf> = task.classpath.full.iter().collect();
        for report in reports {
            for entry in report.explicit_entries() {
                if declared.contains(entry) {
                    push(entry, &mut resolved);
                }
            }
        }
    } else {
        for entry in &task.classpath.full {
            push(entry, &mut resolved);
        }
    }

    let generated_classes = &task.directories.generated_classes;
    if !generated_classes.as_os_str().is_empty() {
        push(generated_classes, &mut resolved);
    }

    resolved
}

/// Join entries with the platform path-list separator for the `-cp` flag.
pub fn join(entries: &[PathBuf]) -> String {
    let separator = if cfg!(windows) { ";" } else { ":" };
    entries
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(separator)
}
