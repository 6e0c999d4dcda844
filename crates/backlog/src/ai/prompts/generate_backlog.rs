//! Backlog generation prompt template.
//!
//! Turns a requirements analysis into a line-oriented backlog that the
//! parser in `domain::parser` reads back.

use serde::Serialize;

use super::{PromptTemplate, GENERATE_BACKLOG};

/// Reference effort for one story point value.
#[derive(Debug, Clone, Serialize)]
pub struct EffortExample {
    pub points: u8,
    /// Pre-formatted day count
    pub days: String,
}

/// Context for the generate-backlog prompt.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateBacklogContext {
    /// Output of the analysis stage
    pub analysis: String,
    /// Technologies the team will use
    pub technologies: Vec<String>,
    /// Display label of the team skill level
    pub skill_level: String,
    /// Days of effort for one story point at this level
    pub base_effort: String,
    /// Allowed story point values, comma separated
    pub point_values: String,
    pub effort_examples: Vec<EffortExample>,
}

/// Get the generate-backlog template.
pub fn template() -> PromptTemplate {
    PromptTemplate::new(GENERATE_BACKLOG, SYSTEM_PROMPT, USER_PROMPT)
        .with_description("Generate a three-level agile backlog from a requirements analysis")
}

const SYSTEM_PROMPT: &str = r"## Role
You are an experienced agile product owner and technical lead. You write backlogs that a development team can estimate and plan from directly.

## Task
Produce a backlog organised in three levels: epics, features and user stories. Every feature belongs to the epic above it and every story belongs to the feature above it.

## Output format
Write one item per line, using exactly these three line forms and nothing else:

EPIC: <name> | <description>
FEATURE: <name>
STORY: <text> | <points> | <effort in days>

- Story text follows the form: As a <role>, I want <goal> so that <benefit>.
- Never use the `|` character inside a name, description or story text.
- <points> is one of: {{point_values}}.
- <effort in days> is a decimal number using a dot as separator.
- Do not add headings, numbering, bullets, blank commentary or code fences.

## Estimation
The team skill level is {{skill_level}}. At this level one story point represents {{base_effort}} day(s) of effort. Use these reference values and scale the effort to each story:
{{#each effort_examples}}- {{points}} point(s): about {{days}} day(s)
{{/each}}
## Rules
- Only reference features that appear in the requirements analysis.
- Only reference the technologies listed by the user. Do not introduce other frameworks, languages or services.
- Cover every functional feature of the analysis with at least one story.";

const USER_PROMPT: &str = r"Requirements analysis:

---
{{analysis}}
---

Technologies:
{{#each technologies}}- {{this}}
{{/each}}
Generate the backlog now.";
