//! Deterministic jar creation
//!
//! Archive bytes must be reproducible across machines and sandboxes: entries
//! are written in sorted name order, every entry carries the DOS epoch
//! timestamp, and the manifest is always the first entry. A `Target-Label`
//! manifest attribute records which build unit produced the archive.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{JarError, JarResult};

const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Where an entry's bytes come from at write time.
#[derive(Debug, Clone)]
enum EntrySource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Builds a jar with deterministic entry ordering and timestamps.
#[derive(Debug)]
pub struct JarWriter {
    output: PathBuf,
    target_label: Option<String>,
    entries: BTreeMap<String, EntrySource>,
}

impl JarWriter {
    /// Create a writer that will produce the archive at `output`.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            target_label: None,
            entries: BTreeMap::new(),
        }
    }

    /// Record the originating build-unit label in the manifest.
    pub fn with_target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = Some(label.into());
        self
    }

    /// Add every file under `dir`, named relative to `dir` with `/` separators.
    ///
    /// A missing directory adds nothing: the compile step may legitimately
    /// produce an empty output tree (e.g. a module with only annotations).
    pub fn add_directory_contents(&mut self, dir: &Path) -> JarResult<()> {
        if !dir.exists() {
            return Ok(());
        }
        for entry in WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let rel = path
                .strip_prefix(dir)
                .map_err(|e| JarError::io(path, io::Error::other(e)))?;
            let name = rel.to_string_lossy().replace('\\', "/");
            self.entries
                .insert(name, EntrySource::File(path.to_path_buf()));
        }
        Ok(())
    }

    /// Add a single entry from in-memory bytes, replacing any same-named entry.
    pub fn add_bytes(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), EntrySource::Bytes(bytes));
    }

    /// Number of entries staged so far (manifest not included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries have been staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the archive. The manifest goes first; everything else follows in
    /// sorted name order with normalized timestamps.
    pub fn write(self) -> JarResult<()> {
        let file =
            File::create(&self.output).map_err(|e| JarError::io(&self.output, e))?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        zip.start_file(MANIFEST_NAME, options)
            .map_err(|e| JarError::archive(&self.output, e))?;
        zip.write_all(self.manifest().as_bytes())
            .map_err(|e| JarError::io(&self.output, e))?;

        for (name, source) in &self.entries {
            if name == MANIFEST_NAME {
                continue;
            }
            zip.start_file(name, options)
                .map_err(|e| JarError::archive(&self.output, e))?;
            match source {
                EntrySource::File(path) => {
                    let mut f = File::open(path).map_err(|e| JarError::io(path, e))?;
                    io::copy(&mut f, &mut zip).map_err(|e| JarError::io(path, e))?;
                }
                EntrySource::Bytes(bytes) => {
                    zip.write_all(bytes)
                        .map_err(|e| JarError::io(&self.output, e))?;
                }
            }
        }

        zip.finish()
            .map_err(|e| JarError::archive(&self.output, e))?;
        Ok(())
    }

    fn manifest(&self) -> String {
        let mut manifest = String::from("Manifest-Version: 1.0\r\nCreated-By: kotbuild\r\n");
        if let Some(label) = &self.target_label {
            manifest.push_str("Target-Label: ");
            manifest.push_str(label);
            manifest.push_str("\r\n");
        }
        manifest.push_str("\r\n");
        manifest
    }
}
