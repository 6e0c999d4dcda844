//! Document exporters for an analysis and its backlog.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use tracing::info;

use crate::domain::encoding::normalize_text;
use crate::errors::{BacklogError, BacklogResult};

pub mod pdf;
pub mod spreadsheet;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Spreadsheet,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Spreadsheet => "xlsx",
        }
    }

    /// `backlog_YYYYmmdd_HHMMSS.<ext>`
    pub fn filename(self, at: DateTime<Local>) -> String {
        format!("backlog_{}.{}", at.format("%Y%m%d_%H%M%S"), self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = BacklogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "excel" | "xlsx" | "spreadsheet" => Ok(Self::Spreadsheet),
            _ => Err(BacklogError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Spreadsheet => write!(f, "excel"),
        }
    }
}

/// A rendered, ready-to-download document.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Render the analysis and raw backlog text. Blocking: run off the async runtime.
///
/// Both inputs are normalized first; renderers only ever see clean text.
pub fn render(
    format: ExportFormat,
    analysis: &str,
    backlog_text: &str,
) -> BacklogResult<ExportDocument> {
    let analysis = normalize_text(analysis);
    let backlog_text = normalize_text(backlog_text);
    let bytes = match format {
        ExportFormat::Pdf => pdf::render_pdf(&analysis, &backlog_text)?,
        ExportFormat::Spreadsheet => spreadsheet::render_spreadsheet(&analysis, &backlog_text)?,
    };
    let document = ExportDocument {
        bytes,
        content_type: format.content_type(),
        filename: format.filename(Local::now()),
    };
    info!(
        format = %format,
        size = document.bytes.len(),
        filename = %document.filename,
        "Rendered export"
    );
    Ok(document)
}
