//! Dependency-usage reports
//!
//! A report records, per classpath entry, whether a prior compilation of a
//! build unit referenced it directly (explicit), only transitively
//! (implicit), or not at all. Reports are persisted as binary artifacts; the
//! classpath resolver consumes the reports of a unit's dependencies on a
//! later build as a reduction hint.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// How a classpath entry was used by the reporting build unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageKind {
    /// Referenced directly by compiled code
    Explicit,
    /// Needed only to resolve something a direct dependency exposes
    Implicit,
    /// Present on the classpath but never referenced
    Unused,
}

/// Usage partition of one build unit's classpath.
///
/// Entries are kept sorted so serialized bytes are deterministic for a given
/// logical report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyUsageReport {
    /// Label of the build unit the report describes
    pub label: String,
    pub entries: BTreeMap<PathBuf, UsageKind>,
}

impl DependencyUsageReport {
    /// A valid report with no entries, used when the compile step is skipped.
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Record one entry's usage kind, replacing any earlier record.
    pub fn record(&mut self, entry: impl Into<PathBuf>, kind: UsageKind) {
        self.entries.insert(entry.into(), kind);
    }

    /// Entries the reporting unit referenced directly.
    pub fn explicit_entries(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries
            .iter()
            .filter(|(_, kind)| **kind == UsageKind::Explicit)
            .map(|(path, _)| path)
    }

    /// Read a report from disk. Callers that treat a malformed report as
    /// empty (the classpath resolver) downgrade this error themselves.
    pub fn read(path: &Path) -> DriverResult<Self> {
        let bytes = fs::read(path).map_err(|e| DriverError::io(path, e))?;
        bincode::deserialize(&bytes).map_err(|e| DriverError::report(path, e))
    }

    /// Persist the report as a binary artifact.
    pub fn write(&self, path: &Path) -> DriverResult<()> {
        let bytes = bincode::serialize(self).map_err(|e| DriverError::report(path, e))?;
        fs::write(path, bytes).map_err(|e| DriverError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_preserves_partitions() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("core.jdeps");

        let mut report = DependencyUsageReport::empty("//lib/core:core");
        report.record("deps/guava.jar", UsageKind::Explicit);
        report.record("deps/failure.jar", UsageKind::Implicit);
        report.record("deps/unused.jar", UsageKind::Unused);
        report.write(&path).unwrap();

        let read_back = DependencyUsageReport::read(&path).unwrap();
        assert_eq!(read_back, report);
        assert_eq!(
            read_back.explicit_entries().collect::<Vec<_>>(),
            vec![&PathBuf::from("deps/guava.jar")]
        );
    }

    #[test]
    fn test_empty_report_is_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.jdeps");

        DependencyUsageReport::empty("//lib:lib").write(&path).unwrap();
        let report = DependencyUsageReport::read(&path).unwrap();
        assert_eq!(report.label, "//lib:lib");
        assert!(report.entries.is_empty());
    }

    #[test]
    fn test_malformed_report_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("garbage.jdeps");
        std::fs::write(&path, b"\xff\xff\xff\xffnot a report").unwrap();

        assert!(matches!(
            DependencyUsageReport::read(&path),
            Err(DriverError::Report { .. })
        ));
    }
}
