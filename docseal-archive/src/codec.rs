//! In-memory zip encoding of archive entries.

use crate::entry::ArchiveEntry;
use crate::error::{ArchiveError, ArchiveResult};
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, Write};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Size of the buffer entry contents are streamed through.
pub const BUFFER_SIZE: usize = 4096;

pub(crate) fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Copies `reader` into `writer` through a fixed [`BUFFER_SIZE`] buffer.
pub(crate) fn copy_buffered<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
) -> std::io::Result<u64> {
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
}

pub(crate) fn check_name(name: &str, seen: &mut HashSet<String>) -> ArchiveResult<()> {
    if name.is_empty() || name.ends_with('/') || name.contains('\\') {
        return Err(ArchiveError::InvalidEntryName(name.to_string()));
    }
    if !seen.insert(name.to_string()) {
        return Err(ArchiveError::DuplicateEntry(name.to_string()));
    }
    Ok(())
}

/// Strips the trailing `/` zip uses to mark directories.
pub(crate) fn entry_name(raw: &str) -> &str {
    raw.strip_suffix('/').unwrap_or(raw)
}

/// Packs entries into a zip archive, in the order given.
pub fn pack(entries: &[ArchiveEntry]) -> ArchiveResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut seen = HashSet::with_capacity(entries.len());

    for entry in entries {
        check_name(&entry.name, &mut seen)?;
        if entry.is_directory {
            writer.add_directory(entry.name.as_str(), file_options())?;
        } else {
            writer.start_file(entry.name.as_str(), file_options())?;
            copy_buffered(&mut entry.contents.as_slice(), &mut writer)?;
        }
    }

    let archive = writer.finish()?.into_inner();
    debug!(entries = entries.len(), size = archive.len(), "packed archive");
    Ok(archive)
}

/// Reads every record of a zip archive, in archive order. Names are kept
/// verbatim apart from the directory marker suffix.
pub fn unpack(archive: &[u8]) -> ArchiveResult<Vec<ArchiveEntry>> {
    let mut zip = open(Cursor::new(archive))?;
    let mut entries = Vec::with_capacity(zip.len());

    for index in 0..zip.len() {
        let mut file = zip.by_index(index).map_err(read_error)?;
        let name = entry_name(file.name()).to_string();
        if file.is_dir() {
            entries.push(ArchiveEntry::directory(name));
            continue;
        }
        let mut contents = Vec::with_capacity(file.size().min(1 << 20) as usize);
        copy_buffered(&mut file, &mut contents).map_err(|e| entry_error(&name, e))?;
        entries.push(ArchiveEntry::file(name, contents));
    }

    debug!(entries = entries.len(), size = archive.len(), "unpacked archive");
    Ok(entries)
}

pub(crate) fn open<R: Read + Seek>(reader: R) -> ArchiveResult<ZipArchive<R>> {
    ZipArchive::new(reader).map_err(read_error)
}

/// Maps a zip error raised while reading. I/O errors that did not come from
/// the operating system were raised by the decoder itself and mean the
/// archive is damaged.
pub(crate) fn read_error(err: ZipError) -> ArchiveError {
    match err {
        ZipError::Io(io) if io.raw_os_error().is_some() => ArchiveError::Io(io),
        other => ArchiveError::Corrupt(other.to_string()),
    }
}

/// Maps a failure while streaming an entry's contents. Inflate and checksum
/// failures carry no OS error code; write failures on the destination do.
pub(crate) fn entry_error(name: &str, err: std::io::Error) -> ArchiveError {
    if err.raw_os_error().is_some() {
        ArchiveError::Io(err)
    } else {
        ArchiveError::Corrupt(format!("entry {name}: {err}"))
    }
}
