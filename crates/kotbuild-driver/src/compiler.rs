//! The compilation service adapter
//!
//! Single point of contact with the external compiler's stable service
//! interface. The adapter derives the per-module session identity, assembles
//! compiler arguments in their contractual order, runs the service, maps its
//! result, and guarantees session cleanup on every path.
//!
//! Per invocation the adapter moves through: session created, arguments
//! configured, compiling, then exactly one of succeeded / compile error /
//! OOM / internal error, then cleaned. Nothing is retried internally; a
//! failed compile is reported up, not retried.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, error, warn};

use crate::classpath;
use crate::error::{DriverError, DriverResult};
use crate::incremental::IncrementalSettings;
use crate::session::SessionId;
use crate::task::CompilationTask;
use crate::toolchain::Toolchain;

/// Outcome category of one compiler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationStatus {
    Success,
    /// Sources failed to compile, including argument errors the compiler
    /// reported for malformed flags
    CompilationError,
    OutOfMemory,
    /// Unexpected failure inside the service call
    Internal,
}

/// Result of one compiler invocation.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub status: CompilationStatus,
    /// Captured diagnostic lines, in emission order
    pub diagnostics: Vec<String>,
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        self.status == CompilationStatus::Success
    }
}

/// How the compiler service executes the compiler.
///
/// Only in-process execution exists by design: a long-lived daemon would let
/// state survive past the call and an out-of-process strategy breaks
/// remote-execution compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    InProcess,
}

/// A fully assembled request for the compiler service.
#[derive(Debug, Clone)]
pub struct CompilerInvocation<'a> {
    pub session: SessionId,
    pub strategy: ExecutionStrategy,
    /// Compiler arguments in contractual order; passthrough flags are last
    pub args: Vec<String>,
    pub sources: Vec<PathBuf>,
    pub incremental: Option<&'a IncrementalSettings>,
}

/// Raw service output before status mapping.
#[derive(Debug, Clone)]
pub struct RawCompilerOutput {
    pub exit_code: i32,
    /// Combined captured output in emission order
    pub output: Vec<String>,
}

/// The seam to the external compiler service.
pub trait CompilerService {
    /// Run one compilation. An `Err` here means the service itself failed
    /// (spawn error, broken pipe), not that sources failed to compile.
    fn run(
        &self,
        toolchain: &Toolchain,
        invocation: &CompilerInvocation<'_>,
    ) -> DriverResult<RawCompilerOutput>;

    /// Retire the per-module session. Failures are logged by the adapter and
    /// never affect the compilation's own result.
    fn finish_session(&self, session: &SessionId) -> DriverResult<()>;
}

/// Compile one task. This function never propagates a service failure: an
/// unexpected error is logged and mapped to [`CompilationStatus::Internal`]
/// so one bad service call cannot crash the whole task.
pub fn compile(
    task: &CompilationTask,
    plugin_args: &[String],
    resolved_classpath: &[PathBuf],
    incremental: Option<&IncrementalSettings>,
    toolchain: &Toolchain,
    service: &dyn CompilerService,
) -> CompileResult {
    let session = SessionId::for_module(&task.module_name);
    debug!(module = %task.module_name, session = %session, "starting compile session");

    let invocation = CompilerInvocation {
        session,
        strategy: ExecutionStrategy::InProcess,
        args: assemble_args(task, plugin_args, resolved_classpath),
        sources: task.all_sources(),
        incremental,
    };

    let result = match service.run(toolchain, &invocation) {
        Ok(raw) => map_output(raw),
        Err(e) => {
            error!(module = %task.module_name, error = %e, "compiler service failed");
            CompileResult {
                status: CompilationStatus::Internal,
                diagnostics: vec![format!("internal error: {e}")],
            }
        }
    };

    // Cleanup always runs and never masks the compile result.
    if let Err(e) = service.finish_session(&session) {
        warn!(session = %session, error = %e, "session cleanup failed");
    }

    result
}

/// Ordered argument assembly. Passthrough flags come last deliberately: they
/// may override any computed flag, and an invalid one must reach the compiler
/// so it surfaces as a compiler-reported argument error instead of being
/// dropped here.
fn assemble_args(
    task: &CompilationTask,
    plugin_args: &[String],
    resolved_classpath: &[PathBuf],
) -> Vec<String> {
    let mut args = vec![
        "-module-name".to_string(),
        task.module_name.clone(),
        "-jvm-target".to_string(),
        task.jvm_options.jvm_target.clone(),
        "-language-version".to_string(),
        task.jvm_options.language_version.clone(),
        "-api-version".to_string(),
        task.jvm_options.api_version.clone(),
        "-cp".to_string(),
        classpath::join(resolved_classpath),
    ];
    if !task.friend_paths.is_empty() {
        args.push(format!(
            "-Xfriend-paths={}",
            classpath::join(&task.friend_paths)
        ));
    }
    args.extend(plugin_args.iter().cloned());
    args.extend(task.passthrough_flags.iter().cloned());
    args
}

fn map_output(raw: RawCompilerOutput) -> CompileResult {
    let oom = raw
        .output
        .iter()
        .any(|line| line.contains("java.lang.OutOfMemoryError"));
    // The OOM marker wins over the exit code: a JVM killed by an uncaught
    // OutOfMemoryError exits with status 1, and a compiler that survives one
    // is not trustworthy output either.
    let status = if oom {
        CompilationStatus::OutOfMemory
    } else {
        match raw.exit_code {
            0 => CompilationStatus::Success,
            1 => CompilationStatus::CompilationError,
            _ => CompilationStatus::Internal,
        }
    };
    CompileResult {
        status,
        diagnostics: raw.output,
    }
}

/// Service implementation that runs the compiler's build-tools entry point
/// in a fresh JVM on the toolchain's isolated classpath, captures its
/// combined output for the duration of the call, and lets the process exit
/// carry the session away (in-process strategy inside that JVM; no daemon).
#[derive(Debug, Clone)]
pub struct JvmCompilerService {
    java_binary: PathBuf,
    main_class: String,
}

impl JvmCompilerService {
    pub fn new(java_binary: impl Into<PathBuf>) -> Self {
        Self {
            java_binary: java_binary.into(),
            main_class: "kotbuild.backend.BuildToolsRunner".to_string(),
        }
    }

    /// Override the service entry-point class.
    pub fn with_main_class(mut self, main_class: impl Into<String>) -> Self {
        self.main_class = main_class.into();
        self
    }
}

impl CompilerService for JvmCompilerService {
    fn run(
        &self,
        toolchain: &Toolchain,
        invocation: &CompilerInvocation<'_>,
    ) -> DriverResult<RawCompilerOutput> {
        let mut command = Command::new(&self.java_binary);
        command
            .arg("-cp")
            .arg(classpath::join(toolchain.isolated_classpath()))
            .arg(&self.main_class)
            .arg(format!("--session-id={}", invocation.session))
            .arg("--strategy=in-process");

        if let Some(ic) = invocation.incremental {
            command
                .arg(format!("--ic-working-dir={}", ic.working_dir.display()))
                .arg(format!("--ic-caches-dir={}", ic.caches_dir.display()))
                .arg(format!(
                    "--ic-shrunk-snapshot={}",
                    ic.shrunk_snapshot.display()
                ));
            for snapshot in &ic.dependency_snapshots {
                command.arg(format!("--ic-dependency-snapshot={}", snapshot.display()));
            }
            if ic.force_recompilation {
                command.arg("--ic-force-recompilation");
            }
            // SourceChanges::ToBeCalculated is the only variant; the flag is
            // explicit so the contract is visible in `ps` output
            command.arg("--ic-source-changes=to-be-calculated");
        }

        command.arg("--");
        command.args(&invocation.args);
        command.args(invocation.sources.iter().map(|p| p.as_os_str()));

        // Both streams go to one capture file so diagnostics keep their
        // original interleaving across stdout and stderr.
        let capture_path = std::env::temp_dir().join(format!(
            "kotbuild-{}-{}.out",
            std::process::id(),
            invocation.session
        ));
        let capture =
            File::create(&capture_path).map_err(|e| DriverError::io(&capture_path, e))?;
        let capture_err = capture
            .try_clone()
            .map_err(|e| DriverError::io(&capture_path, e))?;
        command
            .stdout(Stdio::from(capture))
            .stderr(Stdio::from(capture_err));

        let status = command
            .status()
            .map_err(|e| DriverError::Service(format!("failed to spawn compiler JVM: {e}")))?;

        let captured = fs::read(&capture_path).map_err(|e| DriverError::io(&capture_path, e))?;
        let _ = fs::remove_file(&capture_path);
        let lines = String::from_utf8_lossy(&captured)
            .lines()
            .map(str::to_owned)
            .collect();

        Ok(RawCompilerOutput {
            exit_code: status.code().unwrap_or(-1),
            output: lines,
        })
    }

    fn finish_session(&self, _session: &SessionId) -> DriverResult<()> {
        // The compiler JVM exits at the end of `run`, taking all session
        // state with it; there is nothing to retire on this side.
        Ok(())
    }
}
