//! Output assembly
//!
//! Packages whatever the compile step left on disk into the artifacts the
//! task requested. Unrequested outputs are skipped silently. The
//! dependency-usage report is special: once requested it must exist after
//! the task completes, so an empty report is synthesized when the compile
//! step never ran.

use std::path::{Path, PathBuf};

use tracing::debug;

use kotbuild_jar::JarWriter;

use crate::deps::DependencyUsageReport;
use crate::error::DriverResult;
use crate::task::CompilationTask;

/// Assemble all requested artifacts; returns the paths produced.
pub fn assemble(task: &CompilationTask) -> DriverResult<Vec<PathBuf>> {
    let mut produced = Vec::new();

    if let Some(jar) = &task.outputs.jar {
        write_class_jar(task, jar)?;
        produced.push(jar.clone());
    }

    if let Some(abi_jar) = &task.outputs.abi_jar {
        write_jar(task, abi_jar, &[&task.directories.abi_classes])?;
        produced.push(abi_jar.clone());
    }

    if let Some(sources_jar) = &task.outputs.generated_sources_jar {
        write_jar(
            task,
            sources_jar,
            &[
                &task.directories.generated_sources,
                &task.directories.generated_java_sources,
            ],
        )?;
        produced.push(sources_jar.clone());
    }

    if let Some(classes_jar) = &task.outputs.generated_classes_jar {
        write_jar(
            task,
            classes_jar,
            &[
                &task.directories.generated_classes,
                &task.directories.generated_stub_classes,
            ],
        )?;
        produced.push(classes_jar.clone());
    }

    if let Some(jdeps) = &task.outputs.jdeps {
        ensure_jdeps_report(task, jdeps)?;
        produced.push(jdeps.clone());
    }

    debug!(module = %task.module_name, count = produced.len(), "assembled outputs");
    Ok(produced)
}

/// The main class jar. With coverage instrumentation requested, the archive
/// additionally carries a listing of the module's source paths so the
/// coverage runner can map classes back to files.
fn write_class_jar(task: &CompilationTask, output: &Path) -> DriverResult<()> {
    let mut writer = JarWriter::new(output).with_target_label(&task.label);
    writer.add_directory_contents(&task.directories.classes)?;
    if task.instrument_coverage {
        let listing = task
            .all_sources()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        writer.add_bytes(
            format!("{}-paths-for-coverage.txt", task.module_name),
            listing.into_bytes(),
        );
    }
    writer.write()?;
    Ok(())
}

fn write_jar(task: &CompilationTask, output: &Path, dirs: &[&PathBuf]) -> DriverResult<()> {
    let mut writer = JarWriter::new(output).with_target_label(&task.label);
    for dir in dirs {
        if !dir.as_os_str().is_empty() {
            writer.add_directory_contents(dir)?;
        }
    }
    writer.write()?;
    Ok(())
}

/// The jdeps plugin writes the report during compilation; when the compile
/// step was skipped (or the plugin produced nothing) a valid empty report
/// for the module's own label takes its place.
fn ensure_jdeps_report(task: &CompilationTask, output: &Path) -> DriverResult<()> {
    if output.exists() {
        return Ok(());
    }
    debug!(module = %task.module_name, "synthesizing empty dependency report");
    DependencyUsageReport::empty(&task.label).write(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::UsageKind;
    use crate::task::TaskOutputs;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn task_in(dir: &Path) -> CompilationTask {
        let mut task = CompilationTask::new("m", "//m:m");
        task.directories.classes = dir.join("classes");
        task.directories.abi_classes = dir.join("abi-classes");
        task.directories.generated_sources = dir.join("generated-sources");
        task.directories.generated_java_sources = dir.join("generated-java-sources");
        task.directories.generated_classes = dir.join("generated-classes");
        task.directories.generated_stub_classes = dir.join("stub-classes");
        task.directories.temp = dir.join("tmp");
        task
    }

    #[test]
    fn test_unrequested_outputs_skipped_silently() {
        let tmp = tempfile::tempdir().unwrap();
        let task = task_in(tmp.path());
        let produced = assemble(&task).unwrap();
        assert!(produced.is_empty());
    }

    #[test]
    fn test_class_jar_packages_classes_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut task = task_in(tmp.path());
        task.outputs = TaskOutputs {
            jar: Some(tmp.path().join("m.jar")),
            ..TaskOutputs::default()
        };
        fs::create_dir_all(task.directories.classes.join("p")).unwrap();
        fs::write(task.directories.classes.join("p/A.class"), b"bytes").unwrap();

        let produced = assemble(&task).unwrap();
        assert_eq!(produced, vec![tmp.path().join("m.jar")]);
        let entries = kotbuild_jar::list_entries(&produced[0]).unwrap();
        assert!(entries.contains(&"p/A.class".to_string()));
    }

    #[test]
    fn test_coverage_jar_carries_source_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut task = task_in(tmp.path()).with_sources(
            vec![PathBuf::from("src/A.kt")],
            vec![PathBuf::from("src/B.java")],
        );
        task.outputs.jar = Some(tmp.path().join("m.jar"));
        task.instrument_coverage = true;
        fs::create_dir_all(&task.directories.classes).unwrap();

        assemble(&task).unwrap();
        let entries = kotbuild_jar::list_entries(&tmp.path().join("m.jar")).unwrap();
        assert!(entries.contains(&"m-paths-for-coverage.txt".to_string()));
    }

    #[test]
    fn test_generated_sources_jar_merges_both_trees() {
        let tmp = tempfile::tempdir().unwrap();
        let mut task = task_in(tmp.path());
        task.outputs.generated_sources_jar = Some(tmp.path().join("m-gensrc.jar"));
        fs::create_dir_all(&task.directories.generated_sources).unwrap();
        fs::create_dir_all(&task.directories.generated_java_sources).unwrap();
        fs::write(task.directories.generated_sources.join("Gen.kt"), "k").unwrap();
        fs::write(
            task.directories.generated_java_sources.join("Gen.java"),
            "j",
        )
        .unwrap();

        assemble(&task).unwrap();
        let entries = kotbuild_jar::list_entries(&tmp.path().join("m-gensrc.jar")).unwrap();
        assert!(entries.contains(&"Gen.kt".to_string()));
        assert!(entries.contains(&"Gen.java".to_string()));
    }

    #[test]
    fn test_missing_jdeps_report_synthesized_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let mut task = task_in(tmp.path());
        let jdeps = tmp.path().join("m.jdeps");
        task.outputs.jdeps = Some(jdeps.clone());

        assemble(&task).unwrap();
        let report = DependencyUsageReport::read(&jdeps).unwrap();
        assert_eq!(report.label, "//m:m");
        assert!(report.entries.is_empty());
    }

    #[test]
    fn test_existing_jdeps_report_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mut task = task_in(tmp.path());
        let jdeps = tmp.path().join("m.jdeps");
        task.outputs.jdeps = Some(jdeps.clone());

        let mut plugin_written = DependencyUsageReport::empty("//m:m");
        plugin_written.record("dep.jar", UsageKind::Explicit);
        plugin_written.write(&jdeps).unwrap();

        assemble(&task).unwrap();
        let report = DependencyUsageReport::read(&jdeps).unwrap();
        assert_eq!(report, plugin_written);
    }
}
