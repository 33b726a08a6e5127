//! Line and chapter annotation for raw books.

use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::types::{Document, DocumentId};

/// Matches headings such as `CHAPTER XII` or `Chapter 3`.
pub const DEFAULT_CHAPTER_PATTERN: &str = r"^chapter [\divxlc]";

/// Assigns line numbers and running chapter numbers to the lines of a book
#[derive(Debug, Clone)]
pub struct ChapterAnnotator {
    pattern: Regex,
}

impl ChapterAnnotator {
    /// Compile a case-insensitive chapter heading pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { pattern })
    }

    pub fn is_heading(&self, line: &str) -> bool {
        self.pattern.is_match(line.trim_start())
    }

    /// Annotate lines: 1-based line numbers, chapter 0 until the first
    /// heading, then incremented on every heading line (the heading itself
    /// belongs to the chapter it opens).
    pub fn annotate<S: AsRef<str>>(&self, book: &str, lines: &[S]) -> Vec<Document> {
        let mut chapter = 0u32;
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let line = line.as_ref();
                if self.is_heading(line) {
                    chapter += 1;
                }
                Document::new(DocumentId::new(book, chapter, i as u32 + 1), line)
            })
            .collect()
    }
}

/// Annotate with the given pattern, or [`DEFAULT_CHAPTER_PATTERN`].
pub fn annotate_lines<S: AsRef<str>>(
    book: &str,
    lines: &[S],
    chapter_pattern: Option<&str>,
) -> Result<Vec<Document>> {
    let annotator = ChapterAnnotator::new(chapter_pattern.unwrap_or(DEFAULT_CHAPTER_PATTERN))?;
    let docs = annotator.annotate(book, lines);
    tracing::debug!(
        book,
        lines = docs.len(),
        chapters = docs.last().map(|d| d.id.chapter).unwrap_or(0),
        "annotated book"
    );
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapters_are_cumulative() {
        let lines = [
            "EMMA",
            "",
            "CHAPTER I",
            "Emma Woodhouse, handsome, clever, and rich",
            "Chapter II",
            "Mr. Weston was a man of unexceptionable character",
        ];
        let docs = annotate_lines("emma", &lines, None).unwrap();
        let chapters: Vec<u32> = docs.iter().map(|d| d.id.chapter).collect();
        assert_eq!(chapters, vec![0, 0, 1, 1, 2, 2]);
        assert_eq!(docs[5].id.line, 6);
    }

    #[test]
    fn test_non_heading_mentions_ignored() {
        let annotator = ChapterAnnotator::new(DEFAULT_CHAPTER_PATTERN).unwrap();
        assert!(!annotator.is_heading("in the last chapter of her life"));
        assert!(annotator.is_heading("  CHAPTER 12"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(annotate_lines("b", &["x"], Some("(unclosed")).is_err());
    }
}
