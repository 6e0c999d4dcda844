//! Line-oriented backlog parser.
//!
//! Model output is scanned one line at a time. Each line is classified
//! ([`classify_line`]) and fed to a three-state machine ([`ParseState`]) that
//! decides whether the item can be attached to the hierarchy. Accepted items
//! are emitted as [`ParseEvent`]s; the parser folds them into a [`Backlog`]
//! and the spreadsheet exporter turns them into rows, so both always agree
//! on nesting order.
//!
//! Parsing never fails. Lines that cannot be used are either reported in
//! [`ParseReport::rejected`] (malformed stories) or counted as orphans.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::encoding::normalize_text;
use crate::entities::{Backlog, Epic, Feature, Story, StoryPoints};

// Matches the first marker anywhere in the line (`1. EPIC: ...`, `- STORY: ...`).
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(EPIC|FEATURE|STORY)\s*:\s*(.*)$").expect("marker pattern is valid")
});

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})\b").expect("points pattern is valid"));

static LEADING_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:[.,]\d+)?|[.,]\d+)").expect("effort pattern is valid")
});

/// Parser state between lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// No epic seen yet.
    NoEpic,
    /// Inside an epic, no feature opened since.
    InEpic,
    /// Inside a feature of the current epic.
    InFeature,
}

impl ParseState {
    /// Transition for one classified line.
    pub fn next(self, line: &LineKind) -> Self {
        match (self, line) {
            (_, LineKind::Epic { .. }) => Self::InEpic,
            (Self::InEpic | Self::InFeature, LineKind::Feature { .. }) => Self::InFeature,
            (state, _) => state,
        }
    }

    /// Whether a line of this kind has a parent to attach to.
    fn accepts(self, line: &LineKind) -> bool {
        match line {
            LineKind::Epic { .. } | LineKind::Other => true,
            LineKind::Feature { .. } => self != Self::NoEpic,
            LineKind::Story { .. } | LineKind::MalformedStory { .. } => self == Self::InFeature,
        }
    }
}

/// Classification of a single line of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Epic { name: String, description: String },
    Feature { name: String, description: String },
    /// A story line with exactly three `|`-separated fields.
    Story {
        text: String,
        points: String,
        effort: String,
    },
    /// A story line with the wrong number of fields.
    MalformedStory { fields: usize },
    /// Blank lines, prose, headings.
    Other,
}

/// Remove markdown decoration (`**`, leading `#`, `-`, `*`, `>`) around a line.
fn strip_decoration(line: &str) -> String {
    line.replace("**", "")
        .trim()
        .trim_start_matches(|c: char| matches!(c, '#' | '-' | '*' | '>' | '+') || c.is_whitespace())
        .trim()
        .to_string()
}

/// Split `name | description`; the description is optional.
fn name_and_description(rest: &str) -> (String, String) {
    match rest.split_once('|') {
        Some((name, description)) => (name.trim().to_string(), description.trim().to_string()),
        None => (rest.trim().to_string(), String::new()),
    }
}

/// Classify one line of model output.
pub fn classify_line(line: &str) -> LineKind {
    let cleaned = strip_decoration(line);
    let Some(captures) = MARKER.captures(&cleaned) else {
        return LineKind::Other;
    };
    let rest = captures.get(2).map_or("", |m| m.as_str());

    match captures[1].to_ascii_uppercase().as_str() {
        "EPIC" => {
            let (name, description) = name_and_description(rest);
            LineKind::Epic { name, description }
        }
        "FEATURE" => {
            let (name, description) = name_and_description(rest);
            LineKind::Feature { name, description }
        }
        _ => {
            let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
            match fields.as_slice() {
                [text, points, effort] => LineKind::Story {
                    text: (*text).to_string(),
                    points: (*points).to_string(),
                    effort: (*effort).to_string(),
                },
                _ => LineKind::MalformedStory {
                    fields: fields.len(),
                },
            }
        }
    }
}

/// Parse a points field such as `3`, `3 pts` or `13 points`.
pub fn parse_points(field: &str) -> Option<StoryPoints> {
    let captures = LEADING_INTEGER.captures(field.trim())?;
    let value: u8 = captures[1].parse().ok()?;
    StoryPoints::try_from(value).ok()
}

/// Parse an effort field such as `0.375`, `0,375` or `0.5 j`. Must be positive.
pub fn parse_effort(field: &str) -> Option<f64> {
    let captures = LEADING_DECIMAL.captures(field.trim())?;
    let value: f64 = captures[1].replace(',', ".").parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// An item accepted into the hierarchy, in input order.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    Epic { name: String, description: String },
    Feature { name: String, description: String },
    Story(Story),
}

/// A line that looked like a story but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedLine {
    /// 1-based line number in the normalized text.
    pub line_number: usize,
    pub reason: String,
}

/// Result of [`scan`]: accepted events plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub events: Vec<ParseEvent>,
    pub rejected: Vec<RejectedLine>,
    /// FEATURE/STORY lines that appeared before their parent.
    pub orphaned_lines: usize,
}

/// Run the line state machine over `text`.
pub fn scan(text: &str) -> Scan {
    let text = normalize_text(text);
    let mut state = ParseState::NoEpic;
    let mut result = Scan::default();

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let kind = classify_line(raw);

        if !state.accepts(&kind) {
            result.orphaned_lines += 1;
            continue;
        }

        match &kind {
            LineKind::Epic { name, description } => result.events.push(ParseEvent::Epic {
                name: name.clone(),
                description: description.clone(),
            }),
            LineKind::Feature { name, description } => result.events.push(ParseEvent::Feature {
                name: name.clone(),
                description: description.clone(),
            }),
            LineKind::Story {
                text,
                points,
                effort,
            } => match story_from_fields(text, points, effort) {
                Ok(story) => result.events.push(ParseEvent::Story(story)),
                Err(reason) => result.rejected.push(RejectedLine {
                    line_number,
                    reason,
                }),
            },
            LineKind::MalformedStory { fields } => result.rejected.push(RejectedLine {
                line_number,
                reason: format!("expected 3 '|'-separated fields, found {fields}"),
            }),
            LineKind::Other => {}
        }

        state = state.next(&kind);
    }

    result
}

fn story_from_fields(text: &str, points: &str, effort: &str) -> Result<Story, String> {
    if text.is_empty() {
        return Err("story text is empty".to_string());
    }
    let points = parse_points(points)
        .ok_or_else(|| format!("invalid points '{points}' (expected 1, 3, 5, 8 or 13)"))?;
    let effort_days = parse_effort(effort)
        .ok_or_else(|| format!("invalid effort '{effort}' (expected a positive number of days)"))?;
    Ok(Story {
        text: text.to_string(),
        points,
        effort_days,
    })
}

/// Parsed backlog plus diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub backlog: Backlog,
    pub rejected: Vec<RejectedLine>,
    pub orphaned_lines: usize,
}

impl ParseReport {
    /// True when nothing usable was found, as opposed to an empty-looking success.
    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }
}

/// Parse model output into a backlog, reporting dropped lines.
pub fn parse_with_report(text: &str) -> ParseReport {
    let Scan {
        events,
        rejected,
        orphaned_lines,
    } = scan(text);

    let mut epics: Vec<Epic> = Vec::new();
    for event in events {
        match event {
            ParseEvent::Epic { name, description } => epics.push(Epic::new(name, description)),
            ParseEvent::Feature { name, description } => {
                if let Some(epic) = epics.last_mut() {
                    epic.features.push(Feature::new(name, description));
                }
            }
            ParseEvent::Story(story) => {
                if let Some(feature) = epics.last_mut().and_then(|e| e.features.last_mut()) {
                    feature.stories.push(story);
                }
            }
        }
    }

    if !rejected.is_empty() || orphaned_lines > 0 {
        tracing::debug!(
            rejected = rejected.len(),
            orphaned_lines,
            "Some backlog lines were dropped"
        );
    }

    ParseReport {
        backlog: Backlog::new(epics),
        rejected,
        orphaned_lines,
    }
}

/// Parse model output into a backlog.
pub fn parse(text: &str) -> Backlog {
    parse_with_report(text).backlog
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "EPIC: Core\nFEATURE: Auth\nSTORY: As a user, I want to log in so that I access my data | 3 | 0.375\n";

    #[test]
    fn test_single_story_sample() {
        let backlog = parse(SAMPLE);
        assert_eq!(backlog.epics.len(), 1);
        let epic = &backlog.epics[0];
        assert_eq!(epic.name, "Core");
        assert_eq!(epic.features.len(), 1);
        assert_eq!(epic.features[0].name, "Auth");
        let story = &epic.features[0].stories[0];
        assert_eq!(story.points, StoryPoints::Three);
        assert!((story.effort_days - 0.375).abs() < f64::EPSILON);
        assert_eq!(
            story.text,
            "As a user, I want to log in so that I access my data"
        );
    }

    #[test]
    fn test_state_transitions() {
        let epic = LineKind::Epic {
            name: "E".into(),
            description: String::new(),
        };
        let feature = LineKind::Feature {
            name: "F".into(),
            description: String::new(),
        };
        assert_eq!(ParseState::NoEpic.next(&feature), ParseState::NoEpic);
        assert_eq!(ParseState::NoEpic.next(&epic), ParseState::InEpic);
        assert_eq!(ParseState::InEpic.next(&feature), ParseState::InFeature);
        assert_eq!(ParseState::InFeature.next(&epic), ParseState::InEpic);
        assert_eq!(ParseState::InFeature.next(&LineKind::Other), ParseState::InFeature);
    }

    #[test]
    fn test_malformed_story_lines_are_dropped() {
        let text = "EPIC: Core\nFEATURE: Auth\n\
                    STORY: only two | 3\n\
                    STORY: too | many | fields | here\n\
                    STORY: As a user, I want x so that y | 5 | 1\n";
        let report = parse_with_report(text);
        let stories = &report.backlog.epics[0].features[0].stories;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].points, StoryPoints::Five);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].line_number, 3);
        assert_eq!(report.rejected[1].line_number, 4);
    }

    #[test]
    fn test_invalid_points_are_reported() {
        let text = "EPIC: Core\nFEATURE: Auth\nSTORY: a | 4 | 1\nSTORY: b | 8 | 0\n";
        let report = parse_with_report(text);
        assert!(report.backlog.epics[0].features[0].stories.is_empty());
        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected[0].reason.contains("invalid points"));
        assert!(report.rejected[1].reason.contains("invalid effort"));
    }

    #[test]
    fn test_lenient_fields() {
        assert_eq!(parse_points("3 pts"), Some(StoryPoints::Three));
        assert_eq!(parse_points("13 points"), Some(StoryPoints::Thirteen));
        assert_eq!(parse_points("two"), None);
        assert_eq!(parse_effort("0,375"), Some(0.375));
        assert_eq!(parse_effort("0.5 j"), Some(0.5));
        assert_eq!(parse_effort("2 days"), Some(2.0));
        assert_eq!(parse_effort("-1"), None);
        assert_eq!(parse_effort("0"), None);
    }

    #[test]
    fn test_orphans_are_counted_and_skipped() {
        let text = "FEATURE: Lost\nSTORY: x | 1 | 1\nEPIC: Core\nSTORY: y | 1 | 1\nFEATURE: Auth\n";
        let report = parse_with_report(text);
        assert_eq!(report.orphaned_lines, 3);
        assert_eq!(report.backlog.epics.len(), 1);
        assert_eq!(report.backlog.feature_count(), 1);
        assert_eq!(report.backlog.story_count(), 0);
    }

    #[test]
    fn test_markdown_decoration_and_descriptions() {
        let text = "## **EPIC:** Billing | Invoices and payments\n\
                    - FEATURE : Invoices\n\
                    * STORY: As an accountant, I want PDFs so that I can archive | 8 | 1.5\n";
        let backlog = parse(text);
        let epic = &backlog.epics[0];
        assert_eq!(epic.name, "Billing");
        assert_eq!(epic.description, "Invoices and payments");
        assert_eq!(epic.features[0].name, "Invoices");
        assert_eq!(epic.features[0].stories[0].points, StoryPoints::Eight);
    }

    #[test]
    fn test_numbered_and_prefixed_markers() {
        let text = "1. EPIC: Core\n\
                    1.1 FEATURE: Auth\n\
                    - STORY: As a user, I want to log in so that I access my data | 3 | 0.375\n\
                    Epic 2 - EPIC: Billing\n\
                    FEATURE: Invoices\n\
                    STORY: a | 3 | 1\n";
        let report = parse_with_report(text);
        assert_eq!(report.orphaned_lines, 0);
        let names: Vec<_> = report.backlog.epics.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Core", "Billing"]);
        assert_eq!(report.backlog.epics[0].features[0].name, "Auth");
        assert_eq!(report.backlog.story_count(), 2);
    }

    #[test]
    fn test_first_marker_wins() {
        assert_eq!(
            classify_line("STORY: As a PO, I want an epic: view | 2 | 1"),
            LineKind::Story {
                text: "As a PO, I want an epic: view".into(),
                points: "2".into(),
                effort: "1".into(),
            }
        );
    }

    #[test]
    fn test_order_is_preserved_without_dedup() {
        let text = "EPIC: B\nEPIC: A\nEPIC: B\n";
        let names: Vec<_> = parse(text).epics.into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["B", "A", "B"]);
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let text = format!("{SAMPLE}prose line\nSTORY: bad\r\nEPIC: Second\n");
        assert_eq!(parse(&text), parse(&text));
    }

    #[test]
    fn test_empty_and_prose_inputs() {
        assert!(parse_with_report("").is_empty());
        let report = parse_with_report("Sorry, I cannot help with that.");
        assert!(report.is_empty());
        assert!(report.rejected.is_empty());
        assert!(!parse_with_report(SAMPLE).is_empty());
    }
}
