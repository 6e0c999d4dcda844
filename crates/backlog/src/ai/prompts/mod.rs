//! Prompt template system for backlog generation.
//!
//! This module provides:
//! - Handlebars-based prompt templates
//! - The two pipeline templates (specification analysis, backlog generation)
//! - Deterministic rendering: identical context, byte-identical prompt

use std::collections::HashMap;

use handlebars::Handlebars;
use serde::Serialize;

use crate::entities::{SkillLevel, StoryPoints};
use crate::errors::{BacklogError, BacklogResult};

mod analyze_spec;
mod generate_backlog;

pub use analyze_spec::AnalyzeSpecContext;
pub use generate_backlog::{EffortExample, GenerateBacklogContext};

/// Template id of the requirements analysis stage.
pub const ANALYZE_SPEC: &str = "analyze-spec";

/// Template id of the backlog generation stage.
pub const GENERATE_BACKLOG: &str = "generate-backlog";

/// A rendered prompt, ready to be sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// A prompt template with system and user messages.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Template ID
    pub id: String,
    /// Description
    pub description: String,
    /// System prompt template
    pub system: String,
    /// User prompt template
    pub user: String,
}

impl PromptTemplate {
    pub fn new(id: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            system: system.into(),
            user: user.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Render the template with the given context.
    pub fn render<T: Serialize>(&self, context: &T) -> BacklogResult<Prompt> {
        let mut handlebars = create_handlebars();

        handlebars
            .register_template_string("system", &self.system)
            .map_err(|e| BacklogError::Prompt(format!("Invalid system template: {e}")))?;

        handlebars
            .register_template_string("user", &self.user)
            .map_err(|e| BacklogError::Prompt(format!("Invalid user template: {e}")))?;

        let system = handlebars
            .render("system", context)
            .map_err(|e| BacklogError::Prompt(format!("Failed to render system prompt: {e}")))?;

        let user = handlebars
            .render("user", context)
            .map_err(|e| BacklogError::Prompt(format!("Failed to render user prompt: {e}")))?;

        Ok(Prompt { system, user })
    }
}

/// Handlebars instance in strict mode, without HTML escaping.
fn create_handlebars() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);
    handlebars
}

/// Prompt manager for loading and rendering templates.
pub struct PromptManager {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptManager {
    /// Create a manager with the pipeline templates registered.
    pub fn new() -> Self {
        let mut manager = Self {
            templates: HashMap::new(),
        };
        manager.register(analyze_spec::template());
        manager.register(generate_backlog::template());
        manager
    }

    /// Register (or replace) a template.
    pub fn register(&mut self, template: PromptTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.get(id)
    }

    /// Render a template with context.
    pub fn render<T: Serialize>(&self, id: &str, context: &T) -> BacklogResult<Prompt> {
        let template = self
            .get(id)
            .ok_or_else(|| BacklogError::Prompt(format!("Template '{id}' not found")))?;
        tracing::debug!(template = id, description = %template.description, "Rendering prompt");
        template.render(context)
    }

    /// Prompt asking the model to restate the specification in seven sections.
    pub fn analysis_prompt(&self, specification: &str) -> BacklogResult<Prompt> {
        self.render(
            ANALYZE_SPEC,
            &AnalyzeSpecContext {
                specification: specification.to_string(),
            },
        )
    }

    /// Prompt asking the model for the line-formatted backlog.
    pub fn backlog_prompt(
        &self,
        analysis: &str,
        technologies: &[String],
        level: SkillLevel,
    ) -> BacklogResult<Prompt> {
        let base = level.base_effort_days();
        let context = GenerateBacklogContext {
            analysis: analysis.to_string(),
            technologies: technologies.to_vec(),
            skill_level: level.label().to_string(),
            base_effort: format_days(base),
            point_values: StoryPoints::ALL
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            effort_examples: StoryPoints::ALL
                .iter()
                .map(|p| EffortExample {
                    points: p.value(),
                    days: format_days(base * f64::from(p.value())),
                })
                .collect(),
        };
        self.render(GENERATE_BACKLOG, &context)
    }
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a day count without trailing zeros ("0.0625", "1", "6.5").
fn format_days(days: f64) -> String {
    let text = format!("{days:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
