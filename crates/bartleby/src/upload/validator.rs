//! Batch validation run before anything touches the network.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum number of files per batch.
pub const MAX_FILES: usize = 20;

/// Maximum size of a single file in MiB.
pub const MAX_FILE_SIZE_MIB: u64 = 25;

/// Maximum size of a single file in bytes.
pub const MAX_FILE_SIZE: u64 = MAX_FILE_SIZE_MIB * 1024 * 1024;

pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME types accepted for processing.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "application/pdf",
    "application/msword",
    DOCX_MIME_TYPE,
    "text/plain",
    "text/rtf",
];

/// Coarse type tag used to route files to image or document analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Document,
}

impl FileKind {
    /// Anything under `image/` is an image, everything else a document.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            FileKind::Image
        } else {
            FileKind::Document
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Image => write!(f, "image"),
            FileKind::Document => write!(f, "document"),
        }
    }
}

/// Where the bytes of a selected file live until upload.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file picked by the user, not yet uploaded.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    source: FileSource,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        source: FileSource,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            source,
        }
    }

    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self::new(name, mime_type, bytes.len() as u64, FileSource::Memory(bytes))
    }

    /// Reads metadata for a file on disk. The MIME type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| ValidationError::Unreadable {
                    path: path.to_path_buf(),
                    source: e,
                })?;

        let name = crate::sanitize::redact_path(path);
        // An extension can map to several types; prefer one we accept.
        let guess = mime_guess::from_path(path);
        let mime_type = guess
            .iter_raw()
            .find(|candidate| is_allowed_mime_type(candidate))
            .or_else(|| guess.first_raw())
            .unwrap_or("application/octet-stream");

        Ok(Self::new(
            name,
            mime_type,
            metadata.len(),
            FileSource::Path(path.to_path_buf()),
        ))
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mime(&self.mime_type)
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Image/document counts for an accepted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub images: usize,
    pub documents: usize,
}

impl BatchSummary {
    pub fn of(files: &[SelectedFile]) -> Self {
        let images = files
            .iter()
            .filter(|f| f.kind() == FileKind::Image)
            .count();
        Self {
            images,
            documents: files.len() - images,
        }
    }

    pub fn total(&self) -> usize {
        self.images + self.documents
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Selected {} image{} and {} document{}",
            self.images,
            if self.images == 1 { "" } else { "s" },
            self.documents,
            if self.documents == 1 { "" } else { "s" },
        )
    }
}

/// A batch that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    files: Vec<SelectedFile>,
    summary: BatchSummary,
}

impl ValidatedBatch {
    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    pub fn into_files(self) -> Vec<SelectedFile> {
        self.files
    }
}

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

/// Checks count, then type, then size. Any violation rejects the whole batch.
pub fn validate_batch(files: Vec<SelectedFile>) -> Result<ValidatedBatch, ValidationError> {
    if files.len() > MAX_FILES {
        return Err(ValidationError::TooManyFiles {
            count: files.len(),
            max: MAX_FILES,
        });
    }

    let invalid: Vec<String> = files
        .iter()
        .filter(|f| !is_allowed_mime_type(&f.mime_type))
        .map(|f| f.name.clone())
        .collect();
    if !invalid.is_empty() {
        return Err(ValidationError::InvalidType { files: invalid });
    }

    let oversized: Vec<String> = files
        .iter()
        .filter(|f| f.size_bytes > MAX_FILE_SIZE)
        .map(|f| f.name.clone())
        .collect();
    if !oversized.is_empty() {
        return Err(ValidationError::FileTooLarge {
            files: oversized,
            max_mib: MAX_FILE_SIZE_MIB,
        });
    }

    let summary = BatchSummary::of(&files);
    Ok(ValidatedBatch { files, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, size: u64) -> SelectedFile {
        SelectedFile::new(name, mime, size, FileSource::Path(PathBuf::from(name)))
    }

    #[test]
    fn test_accepts_mixed_batch() {
        let batch = validate_batch(vec![
            file("chair.jpg", "image/jpeg", 1024),
            file("lamp.heic", "image/heic", 2048),
            file("manual.pdf", "application/pdf", 4096),
        ])
        .unwrap();

        assert_eq!(batch.files().len(), 3);
        assert_eq!(batch.summary(), BatchSummary { images: 2, documents: 1 });
        assert_eq!(
            batch.summary().to_string(),
            "Selected 2 images and 1 document"
        );
    }

    #[test]
    fn test_batch_returned_unchanged() {
        let batch = validate_batch(vec![
            file("b.txt", "text/plain", 1),
            file("a.png", "image/png", 1),
        ])
        .unwrap();
        let names: Vec<_> = batch.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.png"]);
    }

    #[test]
    fn test_rejects_more_than_twenty() {
        let files = (0..21)
            .map(|i| file(&format!("{}.png", i), "image/png", 10))
            .collect();
        let err = validate_batch(files).unwrap_err();
        assert!(matches!(err, ValidationError::TooManyFiles { count: 21, max: 20 }));
        assert!(err.to_string().contains("20"));
    }

    #[test]
    fn test_exactly_twenty_is_fine() {
        let files = (0..20)
            .map(|i| file(&format!("{}.png", i), "image/png", 10))
            .collect();
        assert!(validate_batch(files).is_ok());
    }

    #[test]
    fn test_invalid_type_rejects_whole_batch() {
        let err = validate_batch(vec![
            file("ok.pdf", "application/pdf", 10),
            file("setup.exe", "application/x-msdownload", 10),
            file("clip.gif", "image/gif", 10),
        ])
        .unwrap_err();
        match err {
            ValidationError::InvalidType { files } => {
                assert_eq!(files, vec!["setup.exe", "clip.gif"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_file_named() {
        let err = validate_batch(vec![
            file("small.pdf", "application/pdf", 10),
            file("scan.pdf", "application/pdf", 26 * 1024 * 1024),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));
        assert!(err.to_string().contains("scan.pdf"));
        assert!(!err.to_string().contains("small.pdf"));
    }

    #[test]
    fn test_exactly_max_size_accepted() {
        assert!(validate_batch(vec![file("edge.pdf", "application/pdf", MAX_FILE_SIZE)]).is_ok());
    }

    #[test]
    fn test_type_checked_before_size() {
        let err = validate_batch(vec![file("big.zip", "application/zip", MAX_FILE_SIZE + 1)])
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidType { .. }));
    }

    #[test]
    fn test_summary_pluralisation() {
        let one_each = BatchSummary { images: 1, documents: 1 };
        assert_eq!(one_each.to_string(), "Selected 1 image and 1 document");
        let none = BatchSummary::default();
        assert_eq!(none.to_string(), "Selected 0 images and 0 documents");
    }

    #[test]
    fn test_file_kind_from_mime() {
        assert_eq!(FileKind::from_mime("image/webp"), FileKind::Image);
        assert_eq!(FileKind::from_mime("text/rtf"), FileKind::Document);
        assert_eq!(FileKind::from_mime(DOCX_MIME_TYPE), FileKind::Document);
    }

    #[tokio::test]
    async fn test_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let selected = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(selected.name, "notes.txt");
        assert_eq!(selected.mime_type, "text/plain");
        assert_eq!(selected.size_bytes, 5);
        assert_eq!(selected.read_bytes().await.unwrap(), b"hello");

        let path = dir.path().join("essay.rtf");
        tokio::fs::write(&path, b"{\\rtf1}").await.unwrap();
        let selected = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(selected.mime_type, "text/rtf");
        assert_eq!(selected.kind(), FileKind::Document);
        assert!(validate_batch(vec![selected]).is_ok());
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let err = SelectedFile::from_path("/nonexistent/bartleby/photo.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn test_from_bytes() {
        let selected = SelectedFile::from_bytes("a.png", "image/png", vec![1u8, 2, 3]);
        assert_eq!(selected.size_bytes, 3);
        assert_eq!(selected.kind(), FileKind::Image);
        assert_eq!(selected.read_bytes().await.unwrap(), vec![1, 2, 3]);
    }
}
