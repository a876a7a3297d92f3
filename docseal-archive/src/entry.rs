/// One record of an archive: a relative `/`-separated name and its bytes.
///
/// Directory markers carry no content. A zero-byte file is a distinct entry
/// with `is_directory == false`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub contents: Vec<u8>,
    pub is_directory: bool,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: Vec::new(),
            is_directory: true,
        }
    }
}
