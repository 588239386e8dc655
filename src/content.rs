//! Content-kind classification of source files.

use std::path::Path;

/// Extensions treated as movies.
const MOVIE_EXTENSIONS: &[&str] = &[
    "avi", "mov", "mp4", "m4v", "mpg", "mpeg", "mkv", "wmv", "3gp", "mts", "m2ts", "webm",
];

/// Extensions treated as documents.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "odt", "txt", "rtf", "xls", "xlsx"];

/// Broad kind of a source file, deciding how it is thumbnailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Image,
    Movie,
    Document,
    Unsupported,
}

/// Decides the [`ContentKind`] of a source file.
pub trait ContentClassifier: Send + Sync {
    fn classify(&self, path: &Path) -> ContentKind;
}

/// Classifies by file extension (case-insensitive).
///
/// Anything that is neither a known movie nor a known document extension
/// but that `image` recognises is an [`ContentKind::Image`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionClassifier;

impl ContentClassifier for ExtensionClassifier {
    fn classify(&self, path: &Path) -> ContentKind {
        let Some(ext) = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
        else {
            return ContentKind::Unsupported;
        };

        if MOVIE_EXTENSIONS.contains(&ext.as_str()) {
            ContentKind::Movie
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            ContentKind::Document
        } else if image::ImageFormat::from_extension(&ext).is_some() {
            ContentKind::Image
        } else {
            ContentKind::Unsupported
        }
    }
}
