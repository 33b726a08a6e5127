//! Natural Language Processing components
//!
//! This module provides tokenization, stopword filtering and chapter
//! annotation.

pub mod chapters;
pub mod stopwords;
pub mod tokenizer;
