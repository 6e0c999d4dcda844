//! Backlog domain: extraction, parsing, generation and export.

pub mod cache;
pub mod encoding;
pub mod export;
pub mod extract;
pub mod generation;
pub mod parser;

pub use cache::ResultCache;
pub use export::{ExportDocument, ExportFormat};
pub use extract::{extract_text, ExtractionInput};
pub use generation::{BacklogGenerator, BacklogSummary, GenerationOutcome};
pub use parser::{parse, parse_with_report, ParseReport, RejectedLine};
