//! Compilation-orchestration core for a JVM-bytecode-producing toolchain
//!
//! For each build unit the driver runs one external compiler invocation and
//! everything around it:
//! - Toolchain artifact resolution with an isolated compiler classpath
//! - Reduced compile classpaths from prior dependency-usage reports
//! - Auxiliary plugin configuration (dependency-usage extraction, ABI
//!   stripping, code-generation skipping, annotation processing)
//! - Optional snapshot-based incremental compilation
//! - Assembly of the derived output artifacts from one compilation pass
//! - Mapping of compiler results onto a small fixed exit-code space
//!
//! The host build system's action graph, sandboxing, and worker lifecycle
//! live outside this crate; tasks arrive as in-memory [`CompilationTask`]
//! values and results leave as [`BuildOutcome`] values plus files on disk.

pub mod builder;
pub mod classpath;
pub mod compiler;
pub mod deps;
pub mod error;
pub mod exit;
pub mod incremental;
pub mod output;
pub mod plugins;
pub mod session;
pub mod snapshot;
pub mod task;
pub mod toolchain;

// Re-export main types
pub use builder::KotlinBuilder;
pub use compiler::{
    CompilationStatus, CompileResult, CompilerInvocation, CompilerService, ExecutionStrategy,
    JvmCompilerService, RawCompilerOutput,
};
pub use deps::{DependencyUsageReport, UsageKind};
pub use error::{DriverError, DriverResult};
pub use exit::{BuildOutcome, ExitCode};
pub use incremental::{IncrementalSettings, SourceChanges};
pub use session::SessionId;
pub use snapshot::{ClassDigest, ClasspathSnapshot, Granularity};
pub use task::{
    AbiOptions, AnnotationProcessing, ClasspathEntries, CompilationTask, JvmOptions,
    TaskDirectories, TaskOutputs,
};
pub use toolchain::{Toolchain, ToolchainPaths};
