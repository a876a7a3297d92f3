//! Packing directory trees and extracting archives onto disk.

use crate::codec::{
    check_name, copy_buffered, entry_error, entry_name, file_options, open, read_error,
};
use crate::error::{ArchiveError, ArchiveResult};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use zip::ZipWriter;

/// Lists the regular files under `root` as relative `/`-separated names.
///
/// Traversal is depth-first with each directory's children visited in name
/// order, so the result is stable for a given tree. Directories themselves
/// and anything that is neither a file nor a directory are skipped.
pub fn collect_tree(root: &Path) -> ArchiveResult<Vec<String>> {
    if !root.is_dir() {
        return Err(ArchiveError::MissingDestination(root.to_path_buf()));
    }
    let mut names = Vec::new();
    walk(root, "", &mut names)?;
    Ok(names)
}

fn walk(dir: &Path, prefix: &str, names: &mut Vec<String>) -> ArchiveResult<()> {
    let mut children = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let file_name = child.file_name();
        let Some(file_name) = file_name.to_str() else {
            return Err(ArchiveError::InvalidEntryName(
                file_name.to_string_lossy().into_owned(),
            ));
        };
        let name = if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{prefix}/{file_name}")
        };

        let file_type = child.file_type()?;
        if file_type.is_dir() {
            walk(&child.path(), &name, names)?;
        } else if file_type.is_file() {
            names.push(name);
        } else {
            debug!(path = %child.path().display(), "skipping non-regular file");
        }
    }
    Ok(())
}

/// Packs every file under `root` into a zip archive, one record per file.
pub fn pack_dir(root: &Path) -> ArchiveResult<Vec<u8>> {
    let names = collect_tree(root)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut seen = HashSet::with_capacity(names.len());

    for name in &names {
        check_name(name, &mut seen)?;
        writer.start_file(name.as_str(), file_options())?;
        let mut file = File::open(root.join(name))?;
        copy_buffered(&mut file, &mut writer)?;
    }

    let archive = writer.finish()?.into_inner();
    info!(root = %root.display(), files = names.len(), size = archive.len(), "packed directory");
    Ok(archive)
}

/// Resolves an entry name below `destination`, refusing absolute names and
/// `..` segments.
fn resolve(destination: &Path, name: &str) -> ArchiveResult<PathBuf> {
    let unsafe_name = || ArchiveError::UnsafeEntryName {
        name: name.to_string(),
    };
    let mut path = destination.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_name());
            }
        }
    }
    if depth == 0 || name.contains('\\') {
        return Err(unsafe_name());
    }
    Ok(path)
}

/// Extracts an archive into an existing `destination` directory.
///
/// Directory records create directories; file records are streamed to new
/// files with parent directories created as needed. Returns the paths of the
/// files written, in archive order.
pub fn extract(archive: &[u8], destination: &Path) -> ArchiveResult<Vec<PathBuf>> {
    if !destination.is_dir() {
        return Err(ArchiveError::MissingDestination(destination.to_path_buf()));
    }

    let mut zip = open(Cursor::new(archive))?;
    let mut written = Vec::new();

    for index in 0..zip.len() {
        let mut file = zip.by_index(index).map_err(read_error)?;
        let name = entry_name(file.name()).to_string();
        let path = resolve(destination, &name)?;

        if file.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);
        copy_buffered(&mut file, &mut out).map_err(|e| entry_error(&name, e))?;
        out.flush()?;
        written.push(path);
    }

    info!(destination = %destination.display(), files = written.len(), "extracted archive");
    Ok(written)
}
