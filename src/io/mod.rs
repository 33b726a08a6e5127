//! Loading delimited survival tables and plain-text books.

pub mod csv_loader;
pub mod text_loader;

pub use csv_loader::{parse_event, CsvLoader, DroppedRow, LoadReport, LoadedSurvival};
pub use text_loader::{book_id, documents_from_text, load_text_file, load_text_files};
