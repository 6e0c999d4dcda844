//! A4 PDF rendering with `lopdf`.
//!
//! Plain text layout: an "Analysis" heading, the wrapped analysis, then a
//! "Backlog" heading and the backlog lines. Standard Helvetica with
//! WinAnsiEncoding, so characters outside Latin-1 are substituted.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::errors::{BacklogError, BacklogResult};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 10;
const HEADING_SIZE: i64 = 14;
const LEADING: i64 = 14;
const WRAP_COLUMNS: usize = 95;
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    heading: bool,
}

impl Line {
    fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading: false,
        }
    }

    fn heading(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading: true,
        }
    }
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { word.len() + 1 };
        if current_len + needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn layout(analysis: &str, backlog_text: &str) -> Vec<Line> {
    let mut lines = vec![Line::heading("Analysis")];
    for raw in analysis.lines() {
        lines.extend(wrap(raw, WRAP_COLUMNS).into_iter().map(Line::body));
    }
    lines.push(Line::body(""));
    lines.push(Line::heading("Backlog"));
    for raw in backlog_text.lines() {
        lines.extend(wrap(raw, WRAP_COLUMNS).into_iter().map(Line::body));
    }
    lines
}

/// Encode text for a WinAnsiEncoding font.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => bytes.push(b'\''),
            '\u{201c}' | '\u{201d}' => bytes.push(b'"'),
            '\u{2013}' | '\u{2014}' => bytes.push(b'-'),
            '\u{2022}' => bytes.push(0x95),
            '\u{2026}' => bytes.extend_from_slice(b"..."),
            '\u{20ac}' => bytes.push(0x80),
            c => bytes.push(u8::try_from(u32::from(c)).unwrap_or(b'?')),
        }
    }
    bytes
}

fn page_operations(lines: &[Line]) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];
    for line in lines {
        let (font, size) = if line.heading {
            ("F2", HEADING_SIZE)
        } else {
            ("F1", FONT_SIZE)
        };
        operations.push(Operation::new("Tf", vec![font.into(), size.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&line.text),
                StringFormat::Literal,
            )],
        ));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    operations
}

fn export_error(e: &lopdf::Error) -> BacklogError {
    BacklogError::Export {
        reason: format!("PDF rendering failed: {e}"),
    }
}

/// Render the analysis and backlog text as an A4 PDF.
pub fn render_pdf(analysis: &str, backlog_text: &str) -> BacklogResult<Vec<u8>> {
    let lines = layout(analysis, backlog_text);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for chunk in lines.chunks(LINES_PER_PAGE) {
        let content = Content {
            operations: page_operations(chunk),
        };
        let encoded = content.encode().map_err(|e| export_error(&e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).map_err(|_| BacklogError::Export {
        reason: "too many pages".to_string(),
    })?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| BacklogError::Export {
        reason: format!("failed to serialize PDF: {e}"),
    })?;
    Ok(bytes)
}
