//! The unit of work: one build unit's compilation request
//!
//! A `CompilationTask` is constructed once per build-unit invocation by the
//! host build system, validated, and then read by every component of the
//! driver. It is never mutated after construction.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// Output directories the compile step writes into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDirectories {
    /// Main class files
    pub classes: PathBuf,
    /// ABI-stripped class files (jvm-abi-gen output)
    pub abi_classes: PathBuf,
    /// Generated Kotlin sources (annotation processing)
    pub generated_sources: PathBuf,
    /// Generated Java sources (annotation processing)
    pub generated_java_sources: PathBuf,
    /// Classes produced by a prior annotation-processing round
    pub generated_classes: PathBuf,
    /// Annotation-processing stub classes
    pub generated_stub_classes: PathBuf,
    /// Scratch space for plugin option substitution
    pub temp: PathBuf,
    /// Incremental-compilation working directory; empty disables incrementality
    pub incremental_working_dir: Option<PathBuf>,
}

impl TaskDirectories {
    fn all(&self) -> Vec<&PathBuf> {
        let mut dirs = vec![
            &self.classes,
            &self.abi_classes,
            &self.generated_sources,
            &self.generated_java_sources,
            &self.generated_classes,
            &self.generated_stub_classes,
            &self.temp,
        ];
        if let Some(dir) = &self.incremental_working_dir {
            dirs.push(dir);
        }
        dirs
    }
}

/// Requested output artifacts. `None` means "not requested": the assembler
/// skips it silently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutputs {
    pub jar: Option<PathBuf>,
    pub abi_jar: Option<PathBuf>,
    pub generated_sources_jar: Option<PathBuf>,
    pub generated_classes_jar: Option<PathBuf>,
    /// Dependency-usage report; if requested it must exist after the task
    /// completes even when the compile step was skipped
    pub jdeps: Option<PathBuf>,
}

/// Compiler toolchain versions for this task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JvmOptions {
    /// Target bytecode version, e.g. "11"
    pub jvm_target: String,
    /// Language version, e.g. "1.9"
    pub language_version: String,
    /// API version, usually equal to the language version
    pub api_version: String,
}

/// Classpath entry lists as declared by the host build system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClasspathEntries {
    /// Entries declared as direct dependencies
    pub direct: Vec<PathBuf>,
    /// Entries reachable only transitively
    pub transitive: Vec<PathBuf>,
    /// The complete classpath, direct and transitive, in classpath order
    pub full: Vec<PathBuf>,
}

/// Switches for the ABI-stripping plugin.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AbiOptions {
    pub treat_internal_as_private: bool,
    pub remove_private_classes: bool,
    pub remove_debug_info: bool,
}

/// Annotation-processing configuration. Only the classpath/directory contract
/// of the processing tool is consumed here; its pipeline is its own business.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationProcessing {
    /// Fully qualified processor class names
    pub processors: Vec<String>,
    /// Classpath the processors are loaded from
    pub processor_path: Vec<PathBuf>,
}

impl AnnotationProcessing {
    /// Whether any processor is configured.
    pub fn is_active(&self) -> bool {
        !self.processors.is_empty()
    }
}

/// One build unit's compilation request. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationTask {
    /// Module name handed to the compiler (`-module-name`)
    pub module_name: String,
    /// Originating build-unit label, e.g. `//lib/core:core`
    pub label: String,
    pub kotlin_sources: Vec<PathBuf>,
    pub java_sources: Vec<PathBuf>,
    pub directories: TaskDirectories,
    pub outputs: TaskOutputs,
    pub jvm_options: JvmOptions,
    pub classpath: ClasspathEntries,
    pub abi_options: AbiOptions,
    pub annotation_processing: AnnotationProcessing,
    /// Jars whose internal declarations this unit may see (`-Xfriend-paths`)
    pub friend_paths: Vec<PathBuf>,
    /// Usage reports produced by earlier builds of this unit's transitive
    /// dependencies, consumed as classpath-reduction hints
    pub dependency_usage_reports: Vec<PathBuf>,
    /// User-declared plugin option strings, possibly carrying `{placeholder}` tokens
    pub plugin_options: Vec<String>,
    /// Flags passed to the compiler verbatim, after every computed flag
    pub passthrough_flags: Vec<String>,
    /// Compile against direct + recorded-as-used entries instead of the full classpath
    pub reduced_classpath_mode: bool,
    /// Ask the jdeps plugin to enforce strict dependency usage
    pub strict_deps: bool,
    /// Package the class jar with coverage metadata
    pub instrument_coverage: bool,
}

impl CompilationTask {
    /// Create a task with the given identity; everything else starts empty.
    pub fn new(module_name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            label: label.into(),
            kotlin_sources: Vec::new(),
            java_sources: Vec::new(),
            directories: TaskDirectories::default(),
            outputs: TaskOutputs::default(),
            jvm_options: JvmOptions {
                jvm_target: "11".to_string(),
                language_version: "2.0".to_string(),
                api_version: "2.0".to_string(),
            },
            classpath: ClasspathEntries::default(),
            abi_options: AbiOptions::default(),
            annotation_processing: AnnotationProcessing::default(),
            friend_paths: Vec::new(),
            dependency_usage_reports: Vec::new(),
            plugin_options: Vec::new(),
            passthrough_flags: Vec::new(),
            reduced_classpath_mode: false,
            strict_deps: false,
            instrument_coverage: false,
        }
    }

    /// Set the source file lists
    pub fn with_sources(mut self, kotlin: Vec<PathBuf>, java: Vec<PathBuf>) -> Self {
        self.kotlin_sources = kotlin;
        self.java_sources = java;
        self
    }

    /// Set the output directories
    pub fn with_directories(mut self, directories: TaskDirectories) -> Self {
        self.directories = directories;
        self
    }

    /// Set the requested outputs
    pub fn with_outputs(mut self, outputs: TaskOutputs) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set the toolchain versions
    pub fn with_jvm_options(mut self, jvm_options: JvmOptions) -> Self {
        self.jvm_options = jvm_options;
        self
    }

    /// Set the classpath entry lists
    pub fn with_classpath(mut self, classpath: ClasspathEntries) -> Self {
        self.classpath = classpath;
        self
    }

    /// Set the ABI plugin switches
    pub fn with_abi_options(mut self, abi_options: AbiOptions) -> Self {
        self.abi_options = abi_options;
        self
    }

    /// Set user plugin option strings (placeholder tokens allowed)
    pub fn with_plugin_options(mut self, options: Vec<String>) -> Self {
        self.plugin_options = options;
        self
    }

    /// Set verbatim passthrough flags
    pub fn with_passthrough_flags(mut self, flags: Vec<String>) -> Self {
        self.passthrough_flags = flags;
        self
    }

    /// Enable reduced-classpath compilation
    pub fn with_reduced_classpath(mut self, enabled: bool) -> Self {
        self.reduced_classpath_mode = enabled;
        self
    }

    /// Whether the compile step has anything to feed the compiler.
    pub fn has_compilable_sources(&self) -> bool {
        !self.kotlin_sources.is_empty() || !self.java_sources.is_empty()
    }

    /// All sources, Kotlin first, in declaration order.
    pub fn all_sources(&self) -> Vec<PathBuf> {
        let mut sources = self.kotlin_sources.clone();
        sources.extend(self.java_sources.iter().cloned());
        sources
    }

    /// Validate cross-field invariants the type system cannot express.
    pub fn validate(&self) -> DriverResult<()> {
        if self.module_name.is_empty() {
            return Err(DriverError::InvalidTask(
                "module name cannot be empty".to_string(),
            ));
        }
        if self.label.is_empty() {
            return Err(DriverError::InvalidTask(
                "build-unit label cannot be empty".to_string(),
            ));
        }
        if let Some(dir) = &self.directories.incremental_working_dir {
            if dir.as_os_str().is_empty() {
                return Err(DriverError::InvalidTask(
                    "incremental working directory set but empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Eagerly create every output directory. Plugin options may reference
    /// these paths, so this runs before the plugin pipeline.
    pub fn ensure_directories(&self) -> DriverResult<()> {
        for dir in self.directories.all() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            fs::create_dir_all(dir).map_err(|e| DriverError::io(dir, e))?;
        }
        Ok(())
    }

    /// Sources appended after an annotation-processing round: everything
    /// generated under the generated-sources trees.
    pub fn discover_generated_sources(&self) -> Vec<PathBuf> {
        let mut discovered = Vec::new();
        for root in [
            &self.directories.generated_sources,
            &self.directories.generated_java_sources,
        ] {
            if root.as_os_str().is_empty() || !root.exists() {
                continue;
            }
            for entry in walkdir::WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && is_source_file(entry.path()) {
                    discovered.push(entry.path().to_path_buf());
                }
            }
        }
        discovered
    }
}

fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("kt") | Some("java")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_task() -> CompilationTask {
        CompilationTask::new("lib_core", "//lib/core:core")
    }

    #[test]
    fn test_validate_rejects_empty_module_name() {
        let task = CompilationTask::new("", "//lib:lib");
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_minimal_task() {
        assert!(minimal_task().validate().is_ok());
    }

    #[test]
    fn test_has_compilable_sources() {
        let task = minimal_task();
        assert!(!task.has_compilable_sources());

        let task = task.with_sources(vec![PathBuf::from("src/A.kt")], vec![]);
        assert!(task.has_compilable_sources());
    }

    #[test]
    fn test_all_sources_kotlin_first() {
        let task = minimal_task().with_sources(
            vec![PathBuf::from("src/A.kt")],
            vec![PathBuf::from("src/B.java")],
        );
        assert_eq!(
            task.all_sources(),
            vec![PathBuf::from("src/A.kt"), PathBuf::from("src/B.java")]
        );
    }

    #[test]
    fn test_ensure_directories_creates_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut task = minimal_task();
        task.directories.classes = tmp.path().join("classes");
        task.directories.temp = tmp.path().join("tmp");
        task.directories.incremental_working_dir = Some(tmp.path().join("ic"));

        task.ensure_directories().unwrap();
        assert!(tmp.path().join("classes").is_dir());
        assert!(tmp.path().join("tmp").is_dir());
        assert!(tmp.path().join("ic").is_dir());
    }

    #[test]
    fn test_discover_generated_sources_filters_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        let gen = tmp.path().join("gen");
        std::fs::create_dir_all(gen.join("pkg")).unwrap();
        std::fs::write(gen.join("pkg/Gen.kt"), "class Gen").unwrap();
        std::fs::write(gen.join("pkg/Gen.java"), "class Gen {}").unwrap();
        std::fs::write(gen.join("pkg/metadata.bin"), [0u8]).unwrap();

        let mut task = minimal_task();
        task.directories.generated_sources = gen;

        let discovered = task.discover_generated_sources();
        assert_eq!(discovered.len(), 2);
        assert!(discovered.iter().all(|p| is_source_file(p)));
    }
}
