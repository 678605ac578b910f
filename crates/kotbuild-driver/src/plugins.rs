//! Auxiliary compiler plugin configuration
//!
//! Each auxiliary capability (dependency-usage extraction, ABI stripping,
//! code-generation skipping, annotation processing) is one variant of a
//! closed set, carrying only the fields it needs. A single exhaustive match
//! turns the active set into ordered compiler arguments: one `-Xplugin=` per
//! plugin jar followed by its `-P plugin:<id>:<key>=<value>` records.
//!
//! User-declared option strings may carry placeholder tokens standing for
//! task directories; they are substituted eagerly (the directories already
//! exist by the time this module runs) and then passed through verbatim.

use std::path::{Path, PathBuf};

use crate::classpath;
use crate::task::CompilationTask;
use crate::toolchain::Toolchain;

const JDEPS_PLUGIN_ID: &str = "dev.kotbuild.jdeps-gen";
const ABI_PLUGIN_ID: &str = "org.jetbrains.kotlin.jvm.abi";
const KAPT_PLUGIN_ID: &str = "org.jetbrains.kotlin.kapt3";

/// One `plugin:<id>:<key>=<value>` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginOption {
    pub plugin_id: String,
    pub key: String,
    pub value: String,
}

impl PluginOption {
    fn new(plugin_id: &str, key: &str, value: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            key: key.to_string(),
            value: value.into(),
        }
    }

    /// Wire form consumed by the compiler's `-P` flag.
    pub fn encode(&self) -> String {
        format!("plugin:{}:{}={}", self.plugin_id, self.key, self.value)
    }
}

/// The closed set of auxiliary compiler passes this driver configures.
#[derive(Debug, Clone)]
pub enum PluginKind {
    /// Dependency-usage extraction
    JdepsGen {
        output: PathBuf,
        target_label: String,
        direct_dependencies: Vec<PathBuf>,
        full_classpath: Vec<PathBuf>,
        strict: bool,
    },
    /// ABI stripping into a separate class tree
    AbiGen {
        output_dir: PathBuf,
        treat_internal_as_private: bool,
        remove_private_classes: bool,
        remove_debug_info: bool,
    },
    /// Skip code generation entirely; presence is the whole configuration
    SkipCodeGen,
    /// Annotation processing (classpath/directory contract only)
    Kapt {
        processors: Vec<String>,
        processor_path: Vec<PathBuf>,
        generated_sources_dir: PathBuf,
        generated_classes_dir: PathBuf,
        stubs_dir: PathBuf,
    },
}

impl PluginKind {
    fn artifact<'a>(&self, toolchain: &'a Toolchain) -> &'a Path {
        match self {
            Self::JdepsGen { .. } => toolchain.jdeps_gen_plugin(),
            Self::AbiGen { .. } => toolchain.abi_gen_plugin(),
            Self::SkipCodeGen => toolchain.skip_code_gen_plugin(),
            Self::Kapt { .. } => toolchain.kapt_plugin(),
        }
    }

    fn options(&self) -> Vec<PluginOption> {
        match self {
            Self::JdepsGen {
                output,
                target_label,
                direct_dependencies,
                full_classpath,
                strict,
            } => {
                let mut options = vec![
                    PluginOption::new(JDEPS_PLUGIN_ID, "output", path_str(output)),
                    PluginOption::new(JDEPS_PLUGIN_ID, "target_label", target_label.clone()),
                ];
                for dep in direct_dependencies {
                    options.push(PluginOption::new(
                        JDEPS_PLUGIN_ID,
                        "direct_dependencies",
                        path_str(dep),
                    ));
                }
                for entry in full_classpath {
                    options.push(PluginOption::new(
                        JDEPS_PLUGIN_ID,
                        "full_classpath",
                        path_str(entry),
                    ));
                }
                options.push(PluginOption::new(
                    JDEPS_PLUGIN_ID,
                    "strict_kotlin_deps",
                    if *strict { "error" } else { "warn" },
                ));
                options
            }
            Self::AbiGen {
                output_dir,
                treat_internal_as_private,
                remove_private_classes,
                remove_debug_info,
            } => {
                let mut options = vec![PluginOption::new(
                    ABI_PLUGIN_ID,
                    "outputDir",
                    path_str(output_dir),
                )];
                if *treat_internal_as_private {
                    options.push(PluginOption::new(
                        ABI_PLUGIN_ID,
                        "treatInternalAsPrivate",
                        "true",
                    ));
                }
                if *remove_private_classes {
                    options.push(PluginOption::new(
                        ABI_PLUGIN_ID,
                        "removePrivateClasses",
                        "true",
                    ));
                }
                if *remove_debug_info {
                    options.push(PluginOption::new(ABI_PLUGIN_ID, "removeDebugInfo", "true"));
                }
                options
            }
            Self::SkipCodeGen => Vec::new(),
            Self::Kapt {
                processors,
                processor_path,
                generated_sources_dir,
                generated_classes_dir,
                stubs_dir,
            } => {
                let mut options = vec![
                    PluginOption::new(KAPT_PLUGIN_ID, "sources", path_str(generated_sources_dir)),
                    PluginOption::new(KAPT_PLUGIN_ID, "classes", path_str(generated_classes_dir)),
                    PluginOption::new(KAPT_PLUGIN_ID, "stubs", path_str(stubs_dir)),
                    PluginOption::new(KAPT_PLUGIN_ID, "aptMode", "stubsAndApt"),
                ];
                for jar in processor_path {
                    options.push(PluginOption::new(KAPT_PLUGIN_ID, "apclasspath", path_str(jar)));
                }
                for processor in processors {
                    options.push(PluginOption::new(KAPT_PLUGIN_ID, "processors", processor.clone()));
                }
                options
            }
        }
    }
}

/// The ordered set of active plugins for one task, plus the user's verbatim
/// option strings after placeholder substitution.
#[derive(Debug, Clone, Default)]
pub struct PluginPipeline {
    kinds: Vec<PluginKind>,
    user_options: Vec<String>,
}

impl PluginPipeline {
    /// Decide which auxiliary passes a task activates.
    ///
    /// An ABI request without a class-jar request additionally activates the
    /// code-generation-skipping pass; its mere presence is sufficient.
    pub fn from_task(task: &CompilationTask, resolved_classpath: &[PathBuf]) -> Self {
        let mut kinds = Vec::new();

        if let Some(output) = &task.outputs.jdeps {
            kinds.push(PluginKind::JdepsGen {
                output: output.clone(),
                target_label: task.label.clone(),
                direct_dependencies: task.classpath.direct.clone(),
                full_classpath: task.classpath.full.clone(),
                strict: task.strict_deps,
            });
        }

        if task.outputs.abi_jar.is_some() {
            kinds.push(PluginKind::AbiGen {
                output_dir: task.directories.abi_classes.clone(),
                treat_internal_as_private: task.abi_options.treat_internal_as_private,
                remove_private_classes: task.abi_options.remove_private_classes,
                remove_debug_info: task.abi_options.remove_debug_info,
            });
            if task.outputs.jar.is_none() {
                kinds.push(PluginKind::SkipCodeGen);
            }
        }

        if task.annotation_processing.is_active() {
            kinds.push(PluginKind::Kapt {
                processors: task.annotation_processing.processors.clone(),
                processor_path: task.annotation_processing.processor_path.clone(),
                generated_sources_dir: task.directories.generated_sources.clone(),
                generated_classes_dir: task.directories.generated_classes.clone(),
                stubs_dir: task.directories.generated_stub_classes.clone(),
            });
        }

        let user_options = task
            .plugin_options
            .iter()
            .map(|opt| substitute_placeholders(opt, task, resolved_classpath))
            .collect();

        Self {
            kinds,
            user_options,
        }
    }

    pub fn kinds(&self) -> &[PluginKind] {
        &self.kinds
    }

    /// Encode the pipeline as compiler arguments.
    pub fn encode_args(&self, toolchain: &Toolchain) -> Vec<String> {
        let mut args = Vec::new();
        for kind in &self.kinds {
            args.push(format!("-Xplugin={}", kind.artifact(toolchain).display()));
            for option in kind.options() {
                args.push("-P".to_string());
                args.push(option.encode());
            }
        }
        args.extend(self.user_options.iter().cloned());
        args
    }
}

/// Replace `{placeholder}` tokens in a user option with the task's concrete
/// paths. Unknown tokens are left untouched; the compiler will complain about
/// them in context.
pub fn substitute_placeholders(
    option: &str,
    task: &CompilationTask,
    resolved_classpath: &[PathBuf],
) -> String {
    option
        .replace("{generatedClasses}", &path_str(&task.directories.generated_classes))
        .replace("{generatedSources}", &path_str(&task.directories.generated_sources))
        .replace("{stubs}", &path_str(&task.directories.generated_stub_classes))
        .replace("{temp}", &path_str(&task.directories.temp))
        .replace("{classpath}", &classpath::join(resolved_classpath))
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
