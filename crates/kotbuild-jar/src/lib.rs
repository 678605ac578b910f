//! Jar packaging and inspection for the kotbuild driver
//!
//! Provides the pieces of jar handling the compile driver needs:
//! - Deterministic jar creation (normalized timestamps, sorted entries,
//!   MANIFEST.MF written first) so archive bytes are reproducible
//! - Enumeration of `.class` entries from a jar or an exploded directory
//! - A minimal classfile scanner (constant pool + field/method signatures)
//!   backing member-level classpath snapshots

pub mod classfile;
pub mod error;
pub mod reader;
pub mod writer;

pub use classfile::{ClassSummary, MemberSummary};
pub use error::{JarError, JarResult};
pub use reader::{class_entries, list_entries};
pub use writer::JarWriter;
