//! End-to-end orchestration of one compilation task
//!
//! Ties the components together in their contractual order: directories,
//! classpath resolution, plugin configuration, incremental preparation, the
//! compile call, output assembly, diagnostics mapping. One task is processed
//! synchronously start to finish on the calling thread; the builder itself
//! holds only read-only shared state and may serve many threads at once.

use std::sync::Arc;

use tracing::{debug, info};

use crate::classpath;
use crate::compiler::{self, CompilerService};
use crate::error::DriverResult;
use crate::exit::BuildOutcome;
use crate::incremental;
use crate::output;
use crate::plugins::PluginPipeline;
use crate::task::CompilationTask;
use crate::toolchain::Toolchain;

/// Drives compilations against one toolchain and one compiler service.
pub struct KotlinBuilder {
    toolchain: Arc<Toolchain>,
    service: Box<dyn CompilerService + Send + Sync>,
}

impl KotlinBuilder {
    pub fn new(
        toolchain: Arc<Toolchain>,
        service: Box<dyn CompilerService + Send + Sync>,
    ) -> Self {
        Self { toolchain, service }
    }

    /// Process one task start to finish.
    ///
    /// A task with no compilable sources skips the compiler entirely but
    /// still assembles outputs, so a requested dependency report always
    /// exists afterwards.
    pub fn build(&self, task: &CompilationTask) -> DriverResult<BuildOutcome> {
        task.validate()?;
        task.ensure_directories()?;

        let reports = classpath::load_reports(&task.dependency_usage_reports);
        let resolved_classpath = classpath::resolve(task, &reports);
        debug!(
            module = %task.module_name,
            entries = resolved_classpath.len(),
            reduced = task.reduced_classpath_mode,
            "resolved compile classpath"
        );

        let pipeline = PluginPipeline::from_task(task, &resolved_classpath);
        let plugin_args = pipeline.encode_args(&self.toolchain);

        let incremental_settings = incremental::prepare(task, &resolved_classpath)?;

        let task = augment_with_generated_sources(task);
        let outcome = if task.has_compilable_sources() {
            let result = compiler::compile(
                &task,
                &plugin_args,
                &resolved_classpath,
                incremental_settings.as_ref(),
                &self.toolchain,
                self.service.as_ref(),
            );
            BuildOutcome::from_compile(result)
        } else {
            info!(module = %task.module_name, "no compilable sources; skipping compiler");
            BuildOutcome::skipped()
        };

        let produced = output::assemble(&task)?;
        Ok(outcome.with_produced(produced))
    }
}

/// A prior annotation-processing round may have written sources into the
/// generated trees; they join the source set for the main compile.
fn augment_with_generated_sources(task: &CompilationTask) -> CompilationTask {
    let generated = task.discover_generated_sources();
    if generated.is_empty() {
        return task.clone();
    }
    let mut augmented = task.clone();
    for source in generated {
        match source.extension().and_then(|s| s.to_str()) {
            Some("java") => augmented.java_sources.push(source),
            _ => augmented.kotlin_sources.push(source),
        }
    }
    augmented
}
