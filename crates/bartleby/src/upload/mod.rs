pub mod blob;
pub mod validator;

pub use blob::{BlobStore, BlobUploader, HttpBlobStore, StoredBlob, UploadedFileRef};
pub use validator::{
    validate_batch, BatchSummary, FileKind, FileSource, SelectedFile, ValidatedBatch,
    ALLOWED_MIME_TYPES, MAX_FILES, MAX_FILE_SIZE,
};
