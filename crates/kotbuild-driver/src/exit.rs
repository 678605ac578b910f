//! Status-to-exit-code mapping and diagnostics collection
//!
//! The host build system consumes a small fixed exit-code space so the
//! driver composes with process-exit-code tooling: 0 success, 1 compilation
//! error, 3 out of memory, 4 internal error.

use std::path::PathBuf;

use crate::compiler::{CompilationStatus, CompileResult};

/// Process-style exit code for a compilation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl From<CompilationStatus> for ExitCode {
    fn from(status: CompilationStatus) -> Self {
        match status {
            CompilationStatus::Success => ExitCode(0),
            CompilationStatus::CompilationError => ExitCode(1),
            CompilationStatus::OutOfMemory => ExitCode(3),
            CompilationStatus::Internal => ExitCode(4),
        }
    }
}

/// What the host build system gets back for one task.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub status: CompilationStatus,
    /// All diagnostic lines, preprocessing first, then compiler output,
    /// in original order
    pub diagnostics: Vec<String>,
    /// Artifacts written, in assembly order
    pub produced: Vec<PathBuf>,
}

impl BuildOutcome {
    /// Outcome for a task whose compile step was skipped entirely.
    pub fn skipped() -> Self {
        Self {
            status: CompilationStatus::Success,
            diagnostics: Vec::new(),
            produced: Vec::new(),
        }
    }

    pub fn from_compile(result: CompileResult) -> Self {
        Self {
            status: result.status,
            diagnostics: result.diagnostics,
            produced: Vec::new(),
        }
    }

    /// Prepend lines emitted before the compiler ran (plugin preprocessing,
    /// report loading), keeping overall emission order.
    pub fn with_preprocessing_lines(mut self, lines: Vec<String>) -> Self {
        if !lines.is_empty() {
            let mut merged = lines;
            merged.append(&mut self.diagnostics);
            self.diagnostics = merged;
        }
        self
    }

    pub fn with_produced(mut self, produced: Vec<PathBuf>) -> Self {
        self.produced = produced;
        self
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status)
    }

    pub fn is_success(&self) -> bool {
        self.status == CompilationStatus::Success
    }
}
