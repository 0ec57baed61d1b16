//! LeafDoc Upload Storage
//!
//! Saves uploaded leaf images into a single upload directory.
//!
//! ## Storage Model
//!
//! - Files are keyed by their (already sanitised) client filename
//! - Saving a name that already exists replaces the previous file
//! - Each save records the SHA-256 of the content and a best-effort media type
//!
//! ```text
//! <upload_dir>/
//! ├── tomato_leaf.jpg
//! └── IMG_2041.png
//! ```
//!
//! Concurrent uploads with the same name may overwrite each other; the last write wins.
//!
//! ## Example Usage
//!
//! ```no_run
//! use leafdoc_files::UploadStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = UploadStore::new(Path::new("static/uploads"))?;
//! let stored = store.save("leaf.jpg", b"...")?;
//! println!("saved {} ({} bytes)", stored.path.display(), stored.size_bytes);
//! # Ok(())
//! # }
//! ```

mod uploads;

pub use uploads::{StoredUpload, UploadStore};

/// Errors that can occur during upload storage
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Upload directory could not be created or is not a directory
    #[error("Invalid upload directory: {0}")]
    InvalidUploadDirectory(String),

    /// Filename is not a single safe path component
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
