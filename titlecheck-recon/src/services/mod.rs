//! Pipeline services

pub mod archive;
pub mod cleanup;
pub mod inbox_watcher;
pub mod proprietor;
pub mod reconciler;
pub mod spreadsheet;
pub mod text_extractor;

pub use inbox_watcher::{CycleSummary, InboxWatcher};
pub use proprietor::{AddressBoundaryDetector, KeywordBoundaryDetector, ProprietorExtractor};
pub use reconciler::Reconciler;
