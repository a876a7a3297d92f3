use docseal_archive::{
    ArchiveEntry, ArchiveError, collect_tree, extract, pack, pack_dir, unpack,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, name: &str, contents: &[u8]) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn pack_unpack_preserves_entries() {
    let entries = vec![
        ArchiveEntry::file("a.txt", b"alpha".to_vec()),
        ArchiveEntry::directory("docs"),
        ArchiveEntry::file("docs/b.txt", b"beta".to_vec()),
        ArchiveEntry::file("empty.bin", Vec::new()),
    ];
    let archive = pack(&entries).unwrap();
    assert_eq!(unpack(&archive).unwrap(), entries);
}

#[test]
fn zero_byte_file_is_not_a_directory() {
    let archive = pack(&[ArchiveEntry::file("zero", Vec::new())]).unwrap();
    let entries = unpack(&archive).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].is_directory);
    assert!(entries[0].contents.is_empty());
}

#[test]
fn large_entry_crosses_buffer_boundaries() {
    let contents: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    let archive = pack(&[ArchiveEntry::file("big.bin", contents.clone())]).unwrap();
    assert_eq!(unpack(&archive).unwrap()[0].contents, contents);
}

#[test]
fn duplicate_names_are_rejected() {
    let err = pack(&[
        ArchiveEntry::file("same", b"1".to_vec()),
        ArchiveEntry::file("same", b"2".to_vec()),
    ])
    .unwrap_err();
    assert!(matches!(err, ArchiveError::DuplicateEntry(name) if name == "same"));
}

#[test]
fn garbage_is_corrupt() {
    let err = unpack(b"definitely not a zip file").unwrap_err();
    assert!(matches!(err, ArchiveError::Corrupt(_)));
}

#[test]
fn truncated_archive_is_corrupt() {
    let archive = pack(&[ArchiveEntry::file("a.txt", b"alpha".repeat(100))]).unwrap();
    let err = unpack(&archive[..archive.len() / 2]).unwrap_err();
    assert!(matches!(err, ArchiveError::Corrupt(_)));
}

/// Offsets of the first record's compressed bytes: after its local header,
/// up to the central directory.
fn first_record_data(archive: &[u8]) -> std::ops::Range<usize> {
    let name_len = u16::from_le_bytes([archive[26], archive[27]]) as usize;
    let extra_len = u16::from_le_bytes([archive[28], archive[29]]) as usize;
    let central = archive
        .windows(4)
        .position(|w| w == b"PK\x01\x02")
        .unwrap();
    30 + name_len + extra_len..central
}

#[test]
fn damaged_record_data_is_corrupt() {
    let contents: Vec<u8> = (0..20_000u32).map(|i| ((i * 7919) % 253) as u8).collect();
    let archive = pack(&[ArchiveEntry::file("big.bin", contents)]).unwrap();
    let data = first_record_data(&archive);
    assert!(data.len() > 16);

    let destination = TempDir::new().unwrap();
    for offset in data {
        let mut damaged = archive.clone();
        damaged[offset] ^= 0xFF;

        let err = unpack(&damaged).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupt(_)), "unpack at {offset}: {err}");

        let out = destination.path().join(offset.to_string());
        fs::create_dir(&out).unwrap();
        let err = extract(&damaged, &out).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupt(_)), "extract at {offset}: {err}");
    }
}

#[test]
fn collect_tree_is_depth_first_and_sorted() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "b.txt", b"b");
    write(dir.path(), "a/z.txt", b"z");
    write(dir.path(), "a/inner/x.txt", b"x");
    write(dir.path(), "c/y.txt", b"y");
    fs::create_dir_all(dir.path().join("empty")).unwrap();

    let names = collect_tree(dir.path()).unwrap();
    assert_eq!(names, vec!["a/inner/x.txt", "a/z.txt", "b.txt", "c/y.txt"]);
}

#[test]
fn pack_dir_then_extract_reproduces_tree() {
    let source = TempDir::new().unwrap();
    write(source.path(), "a.txt", b"first file");
    write(source.path(), "nested/deeper/b.txt", b"second file");
    write(source.path(), "nested/empty.txt", b"");

    let archive = pack_dir(source.path()).unwrap();

    let names: Vec<String> = unpack(&archive).unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a.txt", "nested/deeper/b.txt", "nested/empty.txt"]);

    let destination = TempDir::new().unwrap();
    let written = extract(&archive, destination.path()).unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(fs::read(destination.path().join("a.txt")).unwrap(), b"first file");
    assert_eq!(
        fs::read(destination.path().join("nested/deeper/b.txt")).unwrap(),
        b"second file"
    );
    assert_eq!(fs::read(destination.path().join("nested/empty.txt")).unwrap(), b"");
}

#[test]
fn extract_creates_directory_records() {
    let archive = pack(&[
        ArchiveEntry::directory("only-dir"),
        ArchiveEntry::file("f.txt", b"f".to_vec()),
    ])
    .unwrap();
    let destination = TempDir::new().unwrap();
    extract(&archive, destination.path()).unwrap();
    assert!(destination.path().join("only-dir").is_dir());
}

#[test]
fn extract_requires_existing_destination() {
    let archive = pack(&[ArchiveEntry::file("f", b"f".to_vec())]).unwrap();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing");
    let err = extract(&archive, &missing).unwrap_err();
    assert!(matches!(err, ArchiveError::MissingDestination(path) if path == missing));
}

#[test]
fn extract_refuses_escaping_names() {
    let archive = pack(&[ArchiveEntry::file("../escape.txt", b"nope".to_vec())]).unwrap();
    // in-memory unpack keeps the name as written
    assert_eq!(unpack(&archive).unwrap()[0].name, "../escape.txt");

    let root = TempDir::new().unwrap();
    let destination = root.path().join("out");
    fs::create_dir(&destination).unwrap();
    let err = extract(&archive, &destination).unwrap_err();
    assert!(matches!(err, ArchiveError::UnsafeEntryName { .. }));
    assert!(!root.path().join("escape.txt").exists());
}

#[test]
fn pack_dir_of_missing_root_fails() {
    let dir = TempDir::new().unwrap();
    let err = pack_dir(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, ArchiveError::MissingDestination(_)));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn unpack_inverts_pack(
            files in proptest::collection::btree_map(
                "[a-z]{1,8}(/[a-z]{1,8}){0,2}",
                proptest::collection::vec(any::<u8>(), 0..512),
                0..12,
            )
        ) {
            let entries: Vec<ArchiveEntry> = files
                .iter()
                .map(|(name, contents)| ArchiveEntry::file(name.clone(), contents.clone()))
                .collect();
            let archive = pack(&entries).unwrap();
            let unpacked: BTreeMap<String, Vec<u8>> = unpack(&archive)
                .unwrap()
                .into_iter()
                .map(|entry| (entry.name, entry.contents))
                .collect();
            prop_assert_eq!(unpacked, files);
        }
    }
}
