//! XLSX rendering with `rust_xlsxwriter`.
//!
//! Two sheets: "Analysis" holds the analysis in one wrapped cell, "Backlog"
//! has one row per epic, feature and story, built from the parser's line
//! scan so the rows follow the same nesting order as the parsed backlog.

use std::fs;

use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};

use crate::domain::parser::{scan, ParseEvent};
use crate::errors::{BacklogError, BacklogResult};

/// Excel's per-cell character limit.
const MAX_CELL_CHARS: usize = 32_767;

const HEADERS: [&str; 5] = ["Type", "Epic", "Description", "Points", "EffortDays"];

/// One row of the "Backlog" sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogRow {
    pub kind: &'static str,
    /// Name of the enclosing epic (the epic itself for epic rows).
    pub epic: String,
    pub description: String,
    pub points: Option<u8>,
    pub effort_days: Option<f64>,
}

/// Build the "Backlog" sheet rows from raw model output.
pub fn backlog_rows(backlog_text: &str) -> Vec<BacklogRow> {
    let mut rows = Vec::new();
    let mut epic_name = String::new();

    for event in scan(backlog_text).events {
        match event {
            ParseEvent::Epic { name, description } => {
                epic_name.clone_from(&name);
                rows.push(BacklogRow {
                    kind: "EPIC",
                    epic: name,
                    description,
                    points: None,
                    effort_days: None,
                });
            }
            ParseEvent::Feature { name, description } => rows.push(BacklogRow {
                kind: "FEATURE",
                epic: epic_name.clone(),
                description: if description.is_empty() {
                    name
                } else {
                    format!("{name}: {description}")
                },
                points: None,
                effort_days: None,
            }),
            ParseEvent::Story(story) => rows.push(BacklogRow {
                kind: "STORY",
                epic: epic_name.clone(),
                description: story.text,
                points: Some(story.points.value()),
                effort_days: Some(story.effort_days),
            }),
        }
    }
    rows
}

fn truncate_cell(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn xlsx_error(e: &XlsxError) -> BacklogError {
    BacklogError::Export {
        reason: format!("spreadsheet rendering failed: {e}"),
    }
}

fn build_workbook(analysis: &str, rows: &[BacklogRow]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let wrapped = Format::new().set_text_wrap().set_align(FormatAlign::Top);
    let bold = Format::new().set_bold();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Analysis")?;
        sheet.set_column_width(0, 120)?;
        sheet.write_string_with_format(0, 0, truncate_cell(analysis), &wrapped)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Backlog")?;
    for (col, header) in (0u16..).zip(HEADERS) {
        sheet.write_string_with_format(0, col, header, &bold)?;
    }
    for (row, item) in (1u32..).zip(rows) {
        sheet.write_string(row, 0, item.kind)?;
        sheet.write_string(row, 1, truncate_cell(&item.epic))?;
        sheet.write_string(row, 2, truncate_cell(&item.description))?;
        if let Some(points) = item.points {
            sheet.write_number(row, 3, f64::from(points))?;
        }
        if let Some(effort) = item.effort_days {
            sheet.write_number(row, 4, effort)?;
        }
    }
    sheet.autofit();

    Ok(workbook)
}

/// Render the workbook through a scoped temporary file and return its bytes.
pub fn render_spreadsheet(analysis: &str, backlog_text: &str) -> BacklogResult<Vec<u8>> {
    let rows = backlog_rows(backlog_text);
    let mut workbook = build_workbook(analysis, &rows).map_err(|e| xlsx_error(&e))?;

    // Removed when `file` drops, on every return path.
    let file = tempfile::Builder::new()
        .prefix("backlog_")
        .suffix(".xlsx")
        .tempfile()?;
    workbook.save(file.path()).map_err(|e| xlsx_error(&e))?;
    let bytes = fs::read(file.path())?;

    tracing::debug!(rows = rows.len(), size = bytes.len(), "Rendered spreadsheet");
    Ok(bytes)
}
