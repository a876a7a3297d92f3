//! Documents handed downstream after a bundle is unpacked.

use docseal_archive::ArchiveEntry;
use serde::{Deserialize, Serialize};

/// One named file from a received bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub contents: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Converts archive entries to documents, dropping directory markers.
    pub fn from_entries(entries: Vec<ArchiveEntry>) -> Vec<Document> {
        entries
            .into_iter()
            .filter(|entry| !entry.is_directory)
            .map(|entry| Document {
                name: entry.name,
                contents: entry.contents,
            })
            .collect()
    }
}

/// An ordered slice of documents published as one message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBatch {
    pub documents: Vec<Document>,
}

impl DocumentBatch {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Sum of document content sizes in bytes.
    pub fn total_bytes(&self) -> usize {
        self.documents.iter().map(|doc| doc.contents.len()).sum()
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_travel_as_base64() {
        let batch = DocumentBatch::new(vec![Document::new("a.txt", b"hello".to_vec())]);
        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(json, r#"{"documents":[{"name":"a.txt","contents":"aGVsbG8="}]}"#);

        let parsed: DocumentBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, batch);
        assert_eq!(parsed.total_bytes(), 5);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = serde_json::from_str::<Document>(r#"{"name":"x","contents":"!!!"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn directories_are_not_documents() {
        let docs = Document::from_entries(vec![
            ArchiveEntry::directory("dir"),
            ArchiveEntry::file("dir/a", b"a".to_vec()),
        ]);
        assert_eq!(docs, vec![Document::new("dir/a", b"a".to_vec())]);
    }
}
