//! Upload input validation.
//!
//! Uploaded filenames are client-supplied and end up as paths under the upload directory, so they
//! are checked against the extension allow-list and reduced to a conservative ASCII form before
//! use.

use crate::constants::ALLOWED_IMAGE_EXTENSIONS;
use crate::{CoreError, CoreResult};

/// Whether `filename` has an allowed image extension (case-insensitive).
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Reduce a client filename to a safe single path component.
///
/// Path separators become whitespace, whitespace runs become `_`, characters outside
/// `[A-Za-z0-9_.-]` are dropped, and leading or trailing `.`/`_` are stripped. The result may be
/// empty.
pub fn secure_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Validate an upload's filename and return the name it should be stored under.
///
/// # Errors
///
/// - `CoreError::NoImageUploaded` when no file part was sent,
/// - `CoreError::NoImageSelected` when the filename is empty,
/// - `CoreError::InvalidFileType` when the extension is not allowed, before or after
///   sanitisation.
pub fn validate_upload_filename(filename: Option<&str>) -> CoreResult<String> {
    let filename = filename.ok_or(CoreError::NoImageUploaded)?;
    if filename.trim().is_empty() {
        return Err(CoreError::NoImageSelected);
    }
    if !allowed_file(filename) {
        return Err(CoreError::InvalidFileType);
    }

    let secured = secure_filename(filename);
    if !allowed_file(&secured) {
        return Err(CoreError::InvalidFileType);
    }
    Ok(secured)
}
