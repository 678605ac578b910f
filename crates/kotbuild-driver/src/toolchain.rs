//! Toolchain artifact resolution and the isolated compiler environment
//!
//! The compiler, its stable-API implementation, and every auxiliary plugin
//! run on a classpath of their own, the *isolated classpath*. It is disjoint
//! from and never mixed with the user classpath handed to the compiled code,
//! so plugin and runtime classes cannot collide with user classes.
//!
//! Constructing the environment is expensive in persistent-worker mode, so
//! [`Toolchain::process_wide`] memoizes one handle per process. The handle is
//! immutable after construction and safe to share across threads.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::{DriverError, DriverResult};

/// Artifact locations as resolved by the host build system.
#[derive(Debug, Clone, Default)]
pub struct ToolchainPaths {
    /// The compiler distribution jar
    pub compiler_jar: PathBuf,
    /// Implementation of the compiler's stable build-tools API
    pub build_tools_impl_jar: PathBuf,
    /// Dependency-usage extraction plugin
    pub jdeps_gen_plugin: PathBuf,
    /// ABI-stripping plugin
    pub abi_gen_plugin: PathBuf,
    /// Code-generation-skipping plugin (ABI-only compiles)
    pub skip_code_gen_plugin: PathBuf,
    /// Annotation-processing plugin
    pub kapt_plugin: PathBuf,
    /// Support libraries needed by plugins only, e.g. the serialization
    /// runtime the jdeps-gen plugin deserializes its config with
    pub support_libraries: Vec<PathBuf>,
}

impl ToolchainPaths {
    fn required(&self) -> Vec<&PathBuf> {
        let mut paths = vec![
            &self.compiler_jar,
            &self.build_tools_impl_jar,
            &self.jdeps_gen_plugin,
            &self.abi_gen_plugin,
            &self.skip_code_gen_plugin,
            &self.kapt_plugin,
        ];
        paths.extend(self.support_libraries.iter());
        paths
    }
}

/// Resolved, verified toolchain handle. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Toolchain {
    paths: ToolchainPaths,
    isolated_classpath: Vec<PathBuf>,
}

static PROCESS_TOOLCHAIN: OnceLock<Arc<Toolchain>> = OnceLock::new();

impl Toolchain {
    /// Verify every artifact and build the isolated classpath.
    ///
    /// Fails with [`DriverError::ArtifactMissing`] on the first path that does
    /// not exist or cannot be opened for reading.
    pub fn load(paths: ToolchainPaths) -> DriverResult<Self> {
        for path in paths.required() {
            verify_artifact(path)?;
        }
        let isolated_classpath = paths.required().into_iter().cloned().collect();
        Ok(Self {
            paths,
            isolated_classpath,
        })
    }

    /// The memoized per-process handle. The first caller's paths win; later
    /// callers receive the already-constructed handle regardless of their
    /// argument, which matches the one-toolchain-per-worker contract.
    pub fn process_wide(paths: ToolchainPaths) -> DriverResult<Arc<Self>> {
        if let Some(toolchain) = PROCESS_TOOLCHAIN.get() {
            return Ok(Arc::clone(toolchain));
        }
        let loaded = Arc::new(Self::load(paths)?);
        Ok(Arc::clone(PROCESS_TOOLCHAIN.get_or_init(|| loaded)))
    }

    /// A new handle with one extra support artifact appended, e.g. a
    /// reflection library added only when a task requests it. The original
    /// handle is not modified.
    pub fn with_augmented(&self, extra: impl AsRef<Path>) -> DriverResult<Self> {
        let extra = extra.as_ref();
        verify_artifact(extra)?;
        let mut augmented = self.clone();
        augmented.paths.support_libraries.push(extra.to_path_buf());
        augmented.isolated_classpath.push(extra.to_path_buf());
        Ok(augmented)
    }

    pub fn compiler_jar(&self) -> &Path {
        &self.paths.compiler_jar
    }

    pub fn build_tools_impl_jar(&self) -> &Path {
        &self.paths.build_tools_impl_jar
    }

    pub fn jdeps_gen_plugin(&self) -> &Path {
        &self.paths.jdeps_gen_plugin
    }

    pub fn abi_gen_plugin(&self) -> &Path {
        &self.paths.abi_gen_plugin
    }

    pub fn skip_code_gen_plugin(&self) -> &Path {
        &self.paths.skip_code_gen_plugin
    }

    pub fn kapt_plugin(&self) -> &Path {
        &self.paths.kapt_plugin
    }

    pub fn support_libraries(&self) -> &[PathBuf] {
        &self.paths.support_libraries
    }

    /// Ordered classpath for the compiler's own JVM, never for user code.
    pub fn isolated_classpath(&self) -> &[PathBuf] {
        &self.isolated_classpath
    }
}

fn verify_artifact(path: &Path) -> DriverResult<()> {
    if !path.is_file() {
        return Err(DriverError::artifact_missing(path));
    }
    // Existence is not enough: sandboxed inputs can be present but unreadable.
    File::open(path)
        .map(|_| ())
        .map_err(|_| DriverError::artifact_missing(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn fake_paths(dir: &Path) -> ToolchainPaths {
        let jar = |name: &str| {
            let path = dir.join(name);
            fs::write(&path, b"PK\x03\x04").unwrap();
            path
        };
        ToolchainPaths {
            compiler_jar: jar("compiler.jar"),
            build_tools_impl_jar: jar("build-tools-impl.jar"),
            jdeps_gen_plugin: jar("jdeps-gen.jar"),
            abi_gen_plugin: jar("jvm-abi-gen.jar"),
            skip_code_gen_plugin: jar("skip-code-gen.jar"),
            kapt_plugin: jar("kapt.jar"),
            support_libraries: vec![jar("serialization-core.jar")],
        }
    }

    #[test]
    fn test_load_verifies_all_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = Toolchain::load(fake_paths(tmp.path())).unwrap();
        assert_eq!(toolchain.isolated_classpath().len(), 7);
    }

    #[test]
    fn test_load_fails_on_missing_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let mut paths = fake_paths(tmp.path());
        paths.abi_gen_plugin = tmp.path().join("missing.jar");

        let result = Toolchain::load(paths);
        assert!(matches!(
            result,
            Err(DriverError::ArtifactMissing { path }) if path.ends_with("missing.jar")
        ));
    }

    #[test]
    fn test_process_wide_first_caller_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let first = Toolchain::process_wide(fake_paths(tmp.path())).unwrap();

        let other = tmp.path().join("other");
        fs::create_dir_all(&other).unwrap();
        let second = Toolchain::process_wide(fake_paths(&other)).unwrap();

        // Same memoized handle regardless of the later caller's paths
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.compiler_jar(), second.compiler_jar());
    }

    #[test]
    fn test_with_augmented_does_not_mutate_original() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = Toolchain::load(fake_paths(tmp.path())).unwrap();

        let reflect = tmp.path().join("reflect.jar");
        fs::write(&reflect, b"PK\x03\x04").unwrap();
        let augmented = toolchain.with_augmented(&reflect).unwrap();

        assert_eq!(toolchain.isolated_classpath().len(), 7);
        assert_eq!(augmented.isolated_classpath().len(), 8);
        assert_eq!(augmented.support_libraries().last().unwrap(), &reflect);
    }

    #[test]
    fn test_with_augmented_verifies_extra_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = Toolchain::load(fake_paths(tmp.path())).unwrap();
        let result = toolchain.with_augmented(tmp.path().join("absent.jar"));
        assert!(matches!(result, Err(DriverError::ArtifactMissing { .. })));
    }
}
