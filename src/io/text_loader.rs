//! Plain-text books: one book per file, named by the file stem.

use std::fs;
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::nlp::chapters::annotate_lines;
use crate::types::Document;

/// Book id for a path: its file stem, or the full path if it has none.
pub fn book_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Split `text` into lines and annotate them with line and chapter numbers.
pub fn documents_from_text(book: &str, text: &str, chapter_pattern: Option<&str>) -> Result<Vec<Document>> {
    let lines: Vec<&str> = text.lines().collect();
    annotate_lines(book, &lines, chapter_pattern)
}

/// Load one text file as a book.
pub fn load_text_file(path: impl AsRef<Path>, chapter_pattern: Option<&str>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let book = book_id(path);
    let docs = documents_from_text(&book, &text, chapter_pattern)?;
    tracing::info!(book = book.as_str(), lines = docs.len(), "loaded text");
    Ok(docs)
}

/// Load several books, concatenated in the given order.
pub fn load_text_files<P: AsRef<Path>>(paths: &[P], chapter_pattern: Option<&str>) -> Result<Vec<Document>> {
    if paths.is_empty() {
        return Err(AnalysisError::EmptyInput("text files"));
    }
    let mut docs = Vec::new();
    for path in paths {
        docs.extend(load_text_file(path, chapter_pattern)?);
    }
    Ok(docs)
}
