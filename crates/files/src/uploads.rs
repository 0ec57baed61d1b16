//! Upload directory service.
//!
//! [`UploadStore`] owns one directory and writes files into it by name. Names must already be
//! sanitised by the caller; the store still refuses anything that is not a single normal path
//! component, so a bad name can never escape the directory.

use crate::FilesError;
use chrono::{DateTime, Utc};
use leafdoc_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Metadata for a saved upload
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredUpload {
    /// Name the file was stored under
    pub file_name: NonEmptyText,

    /// Absolute path of the stored file
    pub path: PathBuf,

    /// Hexadecimal SHA-256 digest of the content
    pub sha256: String,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// Best-effort sniffing of the content; it is not checked against the extension.
    pub media_type: Option<String>,

    /// Whether an earlier upload with the same name was replaced
    pub replaced: bool,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

impl StoredUpload {
    /// Whether the sniffed media type is an image.
    pub fn looks_like_image(&self) -> bool {
        self.media_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }
}

/// Service for saving uploads into a directory
#[derive(Debug, Clone)]
pub struct UploadStore {
    upload_dir: PathBuf,
}

impl UploadStore {
    /// Creates the store, creating `upload_dir` if it does not exist
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidUploadDirectory` if the path exists but is not a directory,
    /// or cannot be created or canonicalised.
    pub fn new(upload_dir: &Path) -> Result<Self, FilesError> {
        if upload_dir.exists() && !upload_dir.is_dir() {
            return Err(FilesError::InvalidUploadDirectory(format!(
                "Path is not a directory: {}",
                upload_dir.display()
            )));
        }

        fs::create_dir_all(upload_dir).map_err(|e| {
            FilesError::InvalidUploadDirectory(format!(
                "Cannot create {}: {}",
                upload_dir.display(),
                e
            ))
        })?;

        let upload_dir = upload_dir.canonicalize().map_err(|e| {
            FilesError::InvalidUploadDirectory(format!(
                "Cannot canonicalize path {}: {}",
                upload_dir.display(),
                e
            ))
        })?;

        Ok(Self { upload_dir })
    }

    /// Canonical upload directory
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Path a file with `file_name` would be stored at
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidFilename` unless `file_name` is exactly one normal path
    /// component.
    pub fn path_for(&self, file_name: &str) -> Result<PathBuf, FilesError> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.upload_dir.join(file_name)),
            _ => Err(FilesError::InvalidFilename(file_name.to_string())),
        }
    }

    /// Writes `bytes` under `file_name`, replacing any existing file of that name
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the name is invalid or the write fails.
    pub fn save(&self, file_name: &str, bytes: &[u8]) -> Result<StoredUpload, FilesError> {
        let name = NonEmptyText::new(file_name)
            .map_err(|_| FilesError::InvalidFilename(file_name.to_string()))?;
        let path = self.path_for(name.as_str())?;

        let replaced = path.exists();
        fs::write(&path, bytes).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write upload to {}: {}", path.display(), e),
            ))
        })?;
        if replaced {
            tracing::debug!("replaced existing upload {}", path.display());
        }

        let sha256 = hex::encode(Sha256::digest(bytes));
        let media_type = infer::get(bytes).map(|kind| kind.mime_type().to_string());

        Ok(StoredUpload {
            file_name: name,
            path,
            sha256,
            size_bytes: bytes.len() as u64,
            media_type,
            replaced,
            stored_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_new_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("static").join("uploads");

        let store = UploadStore::new(&dir).unwrap();

        assert!(dir.is_dir());
        assert!(store.upload_dir().ends_with("uploads"));
    }

    #[test]
    fn test_new_rejects_file_path() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("uploads");
        fs::write(&file, "not a directory").unwrap();

        assert!(matches!(
            UploadStore::new(&file),
            Err(FilesError::InvalidUploadDirectory(_))
        ));
    }

    #[test]
    fn test_save_records_hash_size_and_type() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::new(temp.path()).unwrap();

        let stored = store.save("leaf.png", PNG_MAGIC).unwrap();

        assert_eq!(stored.file_name.as_str(), "leaf.png");
        assert_eq!(stored.size_bytes, PNG_MAGIC.len() as u64);
        assert_eq!(stored.sha256, hex::encode(Sha256::digest(PNG_MAGIC)));
        assert_eq!(stored.sha256.len(), 64);
        assert_eq!(stored.media_type.as_deref(), Some("image/png"));
        assert!(stored.looks_like_image());
        assert!(!stored.replaced);
        assert_eq!(fs::read(&stored.path).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_same_name_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::new(temp.path()).unwrap();

        store.save("leaf.jpg", b"first").unwrap();
        let second = store.save("leaf.jpg", b"second upload").unwrap();

        assert!(second.replaced);
        assert_eq!(fs::read(&second.path).unwrap(), b"second upload");
        assert_eq!(fs::read_dir(store.upload_dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_unknown_content_has_no_media_type() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::new(temp.path()).unwrap();

        let stored = store.save("leaf.jpg", b"plain text, not a jpeg").unwrap();

        assert!(stored.media_type.is_none());
        assert!(!stored.looks_like_image());
    }

    #[test]
    fn test_rejects_names_that_escape_directory() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::new(temp.path()).unwrap();

        for name in ["../leaf.png", "a/b.png", "/etc/passwd", "..", ".", "", "   "] {
            assert!(
                matches!(store.save(name, b"x"), Err(FilesError::InvalidFilename(_))),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn test_stored_upload_serialises() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::new(temp.path()).unwrap();
        let stored = store.save("leaf.png", PNG_MAGIC).unwrap();

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["file_name"], "leaf.png");
        assert_eq!(json["media_type"], "image/png");
    }
}
