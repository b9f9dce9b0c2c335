//! PDF payloads sent to providers.

use base64::{engine::general_purpose, Engine as _};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A PDF file held in memory.
///
/// Bytes are shared, so cloning a document (e.g. when a request is retried)
/// does not copy the payload.
#[derive(Clone)]
pub struct PdfDocument {
    filename: String,
    bytes: Arc<[u8]>,
}

impl PdfDocument {
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            filename: filename.into(),
            bytes: Arc::from(bytes),
        }
    }

    /// Read a PDF from disk. The file name is kept for the provider request.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(Self::from_bytes(filename, bytes))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the payload starts with the PDF header.
    pub fn looks_like_pdf(&self) -> bool {
        self.bytes.starts_with(PDF_MAGIC)
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:` URL form accepted as inline file data.
    pub fn data_url(&self) -> String {
        format!("data:application/pdf;base64,{}", self.to_base64())
    }

    /// Hash of the payload bytes, used for cache keys.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.bytes.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url() {
        let doc = PdfDocument::from_bytes("a.pdf", b"%PDF-1.7".to_vec());
        assert_eq!(doc.data_url(), "data:application/pdf;base64,JVBERi0xLjc=");
        assert!(doc.looks_like_pdf());
    }

    #[test]
    fn test_debug_omits_payload() {
        let doc = PdfDocument::from_bytes("a.pdf", vec![1u8; 64]);
        let debug = format!("{:?}", doc);
        assert!(debug.contains("a.pdf"));
        assert!(debug.contains("64"));
    }

    #[test]
    fn test_hash_tracks_content() {
        let a = PdfDocument::from_bytes("a.pdf", b"same".to_vec());
        let b = PdfDocument::from_bytes("b.pdf", b"same".to_vec());
        let c = PdfDocument::from_bytes("a.pdf", b"other".to_vec());
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[tokio::test]
    async fn test_from_path_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trial.pdf");
        tokio::fs::write(&path, b"%PDF-1.4 body").await.unwrap();

        let doc = PdfDocument::from_path(&path).await.unwrap();
        assert_eq!(doc.filename(), "trial.pdf");
        assert_eq!(doc.len(), 13);
    }
}
