//! Core text-domain types shared across the tokenizer, frequency and
//! sentiment stages.

use serde::{Deserialize, Serialize};

/// Identifiers that travel with every row derived from a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId {
    /// Book (or corpus) name
    pub book: String,
    /// 1-based chapter number (0 before the first chapter heading)
    pub chapter: u32,
    /// 1-based line number within the book
    pub line: u32,
}

impl DocumentId {
    pub fn new(book: impl Into<String>, chapter: u32, line: u32) -> Self {
        Self {
            book: book.into(),
            chapter,
            line,
        }
    }
}

/// A single line of raw text with its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
}

impl Document {
    pub fn new(id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    /// Build documents from plain lines, numbering them from 1 and leaving
    /// them outside any chapter.
    pub fn from_lines<S: AsRef<str>>(book: &str, lines: &[S]) -> Vec<Self> {
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| Self::new(DocumentId::new(book, 0, i as u32 + 1), line.as_ref()))
            .collect()
    }
}

/// One row per token, preserving the originating document identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: DocumentId,
    pub token: String,
}

impl TokenRecord {
    pub fn new(id: DocumentId, token: impl Into<String>) -> Self {
        Self {
            id,
            token: token.into(),
        }
    }
}

/// A document-level key to aggregate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Book,
    Chapter,
    Line,
    /// Fixed-size blocks of lines (`line / size`), the usual narrative index
    LineBlock(u32),
    Word,
}

/// The value of a grouping: only the fields named by the requested keys are
/// populated. Field order defines the deterministic tie-break ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

impl GroupValue {
    /// Project a row onto the requested keys.
    pub fn project(id: &DocumentId, token: &str, keys: &[GroupKey]) -> Self {
        let mut value = Self::default();
        for key in keys {
            match *key {
                GroupKey::Book => value.book = Some(id.book.clone()),
                GroupKey::Chapter => value.chapter = Some(id.chapter),
                GroupKey::Line => value.line = Some(id.line),
                GroupKey::LineBlock(size) => value.block = Some(index_block(id.line, size)),
                GroupKey::Word => value.word = Some(token.to_string()),
            }
        }
        value
    }

    /// Human-readable label, e.g. `emma/12`.
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(book) = &self.book {
            parts.push(book.clone());
        }
        if let Some(chapter) = self.chapter {
            parts.push(format!("ch{chapter}"));
        }
        if let Some(line) = self.line {
            parts.push(format!("l{line}"));
        }
        if let Some(block) = self.block {
            parts.push(format!("#{block}"));
        }
        if let Some(word) = &self.word {
            parts.push(word.clone());
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join("/")
        }
    }
}

/// Index of the block of `size` lines containing `line` (integer division).
///
/// A `size` of zero puts every line in block 0.
pub fn index_block(line: u32, size: u32) -> u32 {
    if size == 0 {
        0
    } else {
        line / size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lines_numbers_from_one() {
        let docs = Document::from_lines("poem", &["a", "b"]);
        assert_eq!(docs[0].id.line, 1);
        assert_eq!(docs[1].id.line, 2);
        assert_eq!(docs[1].id.book, "poem");
    }

    #[test]
    fn test_project_only_requested_keys() {
        let id = DocumentId::new("emma", 3, 170);
        let value = GroupValue::project(&id, "happy", &[GroupKey::Book, GroupKey::LineBlock(80)]);
        assert_eq!(value.book.as_deref(), Some("emma"));
        assert_eq!(value.block, Some(2));
        assert!(value.chapter.is_none());
        assert!(value.word.is_none());
        assert_eq!(value.label(), "emma/#2");
    }

    #[test]
    fn test_index_block_zero_size() {
        assert_eq!(index_block(123, 0), 0);
        assert_eq!(index_block(79, 80), 0);
        assert_eq!(index_block(80, 80), 1);
    }
}
