//! Classpath snapshots
//!
//! A snapshot fingerprints the class-level or member-level structure of one
//! classpath entry so the compiler can tell what actually changed between
//! builds. Externally-managed dependencies get coarse class-level digests;
//! entries under the caller's own output tree get member-level digests,
//! since those are the ones whose ABI-compatible edits we want to avoid
//! recompiling for.
//!
//! Snapshots are keyed by entry identity (a digest of the entry path names
//! the snapshot file) and invalidated when the entry's modification time
//! moves past the snapshot file's.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use kotbuild_jar::{classfile, reader};

use crate::error::{DriverError, DriverResult};

/// Path fragments marking an externally-managed (dependency-repository) entry.
const DEPENDENCY_MARKERS: &[&str] = &["external/", ".m2/", "maven"];

/// Path fragments marking the caller's own build-output tree.
const OUTPUT_TREE_MARKERS: &[&str] = &["bazel-out/", "blaze-out/", "-out/"];

/// How finely an entry is fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    /// One digest per class file
    ClassLevel,
    /// One digest per declared field/method, plus a class-shape digest
    ClassMemberLevel,
}

/// Digest of one class within an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassDigest {
    /// Whole-file digest (class-level granularity, or unscannable class file)
    Whole([u8; 32]),
    /// Per-member digests keyed by `name + descriptor`
    Members {
        class_shape: [u8; 32],
        members: BTreeMap<String, [u8; 32]>,
    },
}

/// Persisted fingerprint of one classpath entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClasspathSnapshot {
    pub entry: PathBuf,
    pub granularity: Granularity,
    pub classes: BTreeMap<String, ClassDigest>,
}

impl ClasspathSnapshot {
    pub fn read(path: &Path) -> DriverResult<Self> {
        let bytes = fs::read(path).map_err(|e| DriverError::io(path, e))?;
        bincode::deserialize(&bytes).map_err(|e| DriverError::report(path, e))
    }

    pub fn write(&self, path: &Path) -> DriverResult<()> {
        let bytes = bincode::serialize(self).map_err(|e| DriverError::report(path, e))?;
        fs::write(path, bytes).map_err(|e| DriverError::io(path, e))
    }
}

/// Pick the snapshot granularity for an entry from its path shape.
///
/// The marker lists are substring heuristics; anything matching neither set
/// is treated as externally managed, the conservative choice.
pub fn classify(entry: &Path) -> Granularity {
    let path = entry.to_string_lossy().replace('\\', "/");
    if DEPENDENCY_MARKERS.iter().any(|m| path.contains(m)) {
        return Granularity::ClassLevel;
    }
    if OUTPUT_TREE_MARKERS.iter().any(|m| path.contains(m)) {
        return Granularity::ClassMemberLevel;
    }
    Granularity::ClassLevel
}

/// Compute a fresh snapshot of `entry` (jar or class directory).
pub fn compute(entry: &Path, granularity: Granularity) -> DriverResult<ClasspathSnapshot> {
    let mut classes = BTreeMap::new();
    for (name, bytes) in reader::class_entries(entry)? {
        let digest = match granularity {
            Granularity::ClassLevel => ClassDigest::Whole(sha256(&bytes)),
            Granularity::ClassMemberLevel => match classfile::scan(&name, &bytes) {
                Ok(summary) => member_digest(&summary),
                // Unscannable class files degrade to a whole-file digest for
                // that class only; any byte change still invalidates it.
                Err(_) => ClassDigest::Whole(sha256(&bytes)),
            },
        };
        classes.insert(name, digest);
    }
    Ok(ClasspathSnapshot {
        entry: entry.to_path_buf(),
        granularity,
        classes,
    })
}

/// File name for an entry's snapshot: a digest of the entry path, so names
/// are filesystem-safe and stable.
pub fn snapshot_file_name(entry: &Path) -> String {
    let digest = sha256(entry.to_string_lossy().as_bytes());
    let mut name = String::with_capacity(76);
    for byte in digest {
        name.push_str(&format!("{byte:02x}"));
    }
    name.push_str(".snapshot");
    name
}

/// Make sure an up-to-date snapshot of `entry` exists under `snapshot_dir`
/// and return its path.
///
/// The modification-time check short-circuits: an entry older than its
/// snapshot is not re-read, so calling this twice on an unchanged entry
/// leaves the snapshot file byte-identical.
pub fn ensure_snapshot(entry: &Path, snapshot_dir: &Path) -> DriverResult<PathBuf> {
    let snapshot_path = snapshot_dir.join(snapshot_file_name(entry));
    if is_current(entry, &snapshot_path) {
        return Ok(snapshot_path);
    }
    let granularity = classify(entry);
    let snapshot = compute(entry, granularity)?;
    fs::create_dir_all(snapshot_dir).map_err(|e| DriverError::io(snapshot_dir, e))?;
    snapshot.write(&snapshot_path)?;
    Ok(snapshot_path)
}

fn is_current(entry: &Path, snapshot_path: &Path) -> bool {
    let entry_mtime = fs::metadata(entry).and_then(|m| m.modified());
    let snapshot_mtime = fs::metadata(snapshot_path).and_then(|m| m.modified());
    match (entry_mtime, snapshot_mtime) {
        (Ok(entry_mtime), Ok(snapshot_mtime)) => entry_mtime <= snapshot_mtime,
        _ => false,
    }
}

fn member_digest(summary: &classfile::ClassSummary) -> ClassDigest {
    let mut shape = Sha256::new();
    shape.update(summary.binary_name.as_bytes());
    shape.update(summary.access_flags.to_be_bytes());

    let mut members = BTreeMap::new();
    for member in &summary.members {
        shape.update(member.signature().as_bytes());
        shape.update(member.access_flags.to_be_bytes());

        let mut hasher = Sha256::new();
        hasher.update(member.access_flags.to_be_bytes());
        hasher.update(member.attributes_digest);
        members.insert(member.signature(), hasher.finalize().into());
    }

    ClassDigest::Members {
        class_shape: shape.finalize().into(),
        members,
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("external/maven/guava.jar", Granularity::ClassLevel)]
    #[case("repo/.m2/repository/lib.jar", Granularity::ClassLevel)]
    #[case("bazel-out/k8-fastbuild/bin/lib.jar", Granularity::ClassMemberLevel)]
    #[case("somewhere/else/lib.jar", Granularity::ClassLevel)]
    fn test_classify(#[case] path: &str, #[case] expected: Granularity) {
        assert_eq!(classify(Path::new(path)), expected);
    }

    #[test]
    fn test_class_level_snapshot_of_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let classes = tmp.path().join("classes");
        std::fs::create_dir_all(classes.join("p")).unwrap();
        std::fs::write(classes.join("p/A.class"), b"\xca\xfe\xba\xbe one").unwrap();
        std::fs::write(classes.join("p/B.class"), b"\xca\xfe\xba\xbe two").unwrap();

        let snapshot = compute(&classes, Granularity::ClassLevel).unwrap();
        assert_eq!(snapshot.classes.len(), 2);
        assert!(matches!(
            snapshot.classes.get("p/A.class"),
            Some(ClassDigest::Whole(_))
        ));
    }

    #[test]
    fn test_member_level_degrades_for_unscannable_class() {
        let tmp = tempfile::tempdir().unwrap();
        let classes = tmp.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("Bad.class"), b"not a class file").unwrap();

        let snapshot = compute(&classes, Granularity::ClassMemberLevel).unwrap();
        assert!(matches!(
            snapshot.classes.get("Bad.class"),
            Some(ClassDigest::Whole(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let classes = tmp.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("A.class"), b"\xca\xfe\xba\xbe").unwrap();

        let snapshot = compute(&classes, Granularity::ClassLevel).unwrap();
        let path = tmp.path().join("entry.snapshot");
        snapshot.write(&path).unwrap();
        assert_eq!(ClasspathSnapshot::read(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_ensure_snapshot_short_circuits_when_current() {
        let tmp = tempfile::tempdir().unwrap();
        let classes = tmp.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("A.class"), b"\xca\xfe\xba\xbe").unwrap();
        let snapshot_dir = tmp.path().join("snapshots");

        let first = ensure_snapshot(&classes, &snapshot_dir).unwrap();
        let first_mtime = std::fs::metadata(&first).unwrap().modified().unwrap();
        let first_bytes = std::fs::read(&first).unwrap();

        let second = ensure_snapshot(&classes, &snapshot_dir).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            std::fs::metadata(&second).unwrap().modified().unwrap(),
            first_mtime
        );
        assert_eq!(std::fs::read(&second).unwrap(), first_bytes);
    }

    #[test]
    fn test_ensure_snapshot_regenerates_when_entry_newer() {
        let tmp = tempfile::tempdir().unwrap();
        let classes = tmp.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("A.class"), b"\xca\xfe\xba\xbe v1").unwrap();
        let snapshot_dir = tmp.path().join("snapshots");

        let path = ensure_snapshot(&classes, &snapshot_dir).unwrap();
        let before = ClasspathSnapshot::read(&path).unwrap();

        std::fs::write(classes.join("A.class"), b"\xca\xfe\xba\xbe v2").unwrap();
        // Push the directory mtime past the snapshot's
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let file = std::fs::File::open(&classes).unwrap();
        file.set_modified(future).unwrap();

        let path = ensure_snapshot(&classes, &snapshot_dir).unwrap();
        let after = ClasspathSnapshot::read(&path).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_snapshot_file_name_stable_and_safe() {
        let a = snapshot_file_name(Path::new("external/maven/guava.jar"));
        let b = snapshot_file_name(Path::new("external/maven/guava.jar"));
        assert_eq!(a, b);
        assert!(a.ends_with(".snapshot"));
        assert!(!a.contains('/'));
    }
}
