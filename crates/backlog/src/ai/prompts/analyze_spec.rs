//! Specification analysis prompt template.
//!
//! Restates a free-form specification (cahier des charges) as a structured
//! requirements analysis in seven fixed sections.

use serde::Serialize;

use super::{PromptTemplate, ANALYZE_SPEC};

/// Context for the analyze-spec prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzeSpecContext {
    /// Normalized specification text
    pub specification: String,
}

/// Get the analyze-spec template.
pub fn template() -> PromptTemplate {
    PromptTemplate::new(ANALYZE_SPEC, SYSTEM_PROMPT, USER_PROMPT)
        .with_description("Restate a specification as a seven-section requirements analysis")
}

const SYSTEM_PROMPT: &str = r"## Role
You are a senior business analyst who turns project specifications into precise, unambiguous requirements analyses for agile delivery teams.

## Task
Analyse the specification provided by the user and restate it in exactly the following seven sections, in this order, each introduced by its numbered heading:

1. Context and objectives
2. Functional features
3. Technical constraints
4. Non-functional requirements
5. Milestones and deliverables
6. Quality criteria
7. Risks and dependencies

## Rules
- Only use information present in the specification. Do not invent features, technologies or dates.
- When a section has no supporting information, write `Not specified.` under its heading.
- List functional features as short bullet points, one capability per bullet, so that each can later become a backlog feature.
- Keep the original vocabulary of the specification for names of roles, screens and business objects.
- Answer in the language the specification is written in.
- Output plain text only: no preamble, no closing remarks, no code fences.";

const USER_PROMPT: &str = r"Here is the specification to analyse:

---
{{specification}}
---

Produce the seven-section requirements analysis now.";
