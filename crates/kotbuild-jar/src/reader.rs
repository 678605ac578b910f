//! Classpath-entry inspection
//!
//! A classpath entry is either a jar or an exploded class directory; both
//! shapes are read through the same functions so snapshotting does not care
//! which one it was handed.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{JarError, JarResult};

/// List all entry names of a jar in archive order.
pub fn list_entries(jar: &Path) -> JarResult<Vec<String>> {
    let file = File::open(jar).map_err(|e| JarError::io(jar, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| JarError::archive(jar, e))?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| JarError::archive(jar, e))?;
        names.push(entry.name().to_owned());
    }
    Ok(names)
}

/// Collect every `.class` entry of a jar or class directory as
/// `(entry name, bytes)` pairs, sorted by entry name.
///
/// Entry names use `/` separators relative to the archive or directory root,
/// so the same class yields the same name from either shape.
pub fn class_entries(entry: &Path) -> JarResult<Vec<(String, Vec<u8>)>> {
    let mut classes = if entry.is_dir() {
        dir_class_entries(entry)?
    } else if entry.is_file() {
        jar_class_entries(entry)?
    } else {
        return Err(JarError::UnsupportedEntry(entry.to_path_buf()));
    };
    classes.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(classes)
}

fn jar_class_entries(jar: &Path) -> JarResult<Vec<(String, Vec<u8>)>> {
    let file = File::open(jar).map_err(|e| JarError::io(jar, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| JarError::archive(jar, e))?;
    let mut classes = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| JarError::archive(jar, e))?;
        if entry.is_dir() || !entry.name().ends_with(".class") {
            continue;
        }
        let name = entry.name().to_owned();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| JarError::io(jar, e))?;
        classes.push((name, bytes));
    }
    Ok(classes)
}

fn dir_class_entries(dir: &Path) -> JarResult<Vec<(String, Vec<u8>)>> {
    let mut classes = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("class") {
            continue;
        }
        let rel = path
            .strip_prefix(dir)
            .map_err(|e| JarError::io(path, std::io::Error::other(e)))?;
        let name = rel.to_string_lossy().replace('\\', "/");
        let bytes = std::fs::read(path).map_err(|e| JarError::io(path, e))?;
        classes.push((name, bytes));
    }
    Ok(classes)
}
