//! Two-stage backlog generation pipeline.
//!
//! analysis prompt → gateway → backlog prompt → gateway → parser, with an
//! optional result cache in front.

use serde::Serialize;
use tracing::{info, warn};

use crate::ai::{LlmGateway, PromptManager};
use crate::config::Config;
use crate::domain::cache::ResultCache;
use crate::domain::parser::{parse_with_report, ParseReport};
use crate::entities::{GenerationRequest, Seed};
use crate::errors::BacklogResult;

/// Counts reported alongside a generated backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BacklogSummary {
    pub epics: usize,
    pub features: usize,
    pub stories: usize,
    pub rejected_lines: usize,
}

/// Everything produced for one request.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub analysis: String,
    /// Raw model output, as returned (or the diagnostic when degraded).
    pub backlog_text: String,
    pub report: ParseReport,
    pub seed: Seed,
    /// True when a stage fell through every provider.
    pub degraded: bool,
    /// True when served from the result cache.
    pub cached: bool,
}

impl GenerationOutcome {
    pub fn summary(&self) -> BacklogSummary {
        let backlog = &self.report.backlog;
        BacklogSummary {
            epics: backlog.epics.len(),
            features: backlog.feature_count(),
            stories: backlog.story_count(),
            rejected_lines: self.report.rejected.len(),
        }
    }
}

/// Orchestrates prompts, gateway calls and parsing.
pub struct BacklogGenerator {
    gateway: LlmGateway,
    prompts: PromptManager,
    cache: ResultCache<GenerationOutcome>,
}

impl BacklogGenerator {
    pub fn new(gateway: LlmGateway, cache_capacity: usize) -> Self {
        Self {
            gateway,
            prompts: PromptManager::new(),
            cache: ResultCache::new(cache_capacity),
        }
    }

    pub fn from_config(config: &Config) -> BacklogResult<Self> {
        Ok(Self::new(
            LlmGateway::from_config(config)?,
            config.cache_capacity,
        ))
    }

    pub fn gateway(&self) -> &LlmGateway {
        &self.gateway
    }

    /// Run the pipeline for a validated request.
    pub async fn generate(&self, request: &GenerationRequest) -> BacklogResult<GenerationOutcome> {
        let fingerprint = request.fingerprint();
        let seed = request.seed();

        if let Some(mut hit) = self.cache.get(&fingerprint).await {
            info!(seed = %seed, "Serving backlog from cache");
            hit.cached = true;
            return Ok(hit);
        }

        info!(
            seed = %seed,
            technologies = request.technologies().len(),
            level = %request.skill_level(),
            "Generating backlog"
        );

        let analysis_prompt = self.prompts.analysis_prompt(request.specification())?;
        let analysis = self.gateway.generate(&analysis_prompt, Some(seed)).await;

        if analysis.degraded {
            warn!(seed = %seed, "Analysis stage degraded, skipping backlog stage");
            return Ok(GenerationOutcome {
                backlog_text: analysis.text.clone(),
                analysis: analysis.text,
                report: ParseReport::default(),
                seed,
                degraded: true,
                cached: false,
            });
        }

        let backlog_prompt = self.prompts.backlog_prompt(
            &analysis.text,
            request.technologies(),
            request.skill_level(),
        )?;
        let backlog = self.gateway.generate(&backlog_prompt, Some(seed)).await;

        let report = if backlog.degraded {
            ParseReport::default()
        } else {
            parse_with_report(&backlog.text)
        };

        let outcome = GenerationOutcome {
            analysis: analysis.text,
            backlog_text: backlog.text,
            report,
            seed,
            degraded: backlog.degraded,
            cached: false,
        };

        let summary = outcome.summary();
        info!(
            seed = %seed,
            degraded = outcome.degraded,
            epics = summary.epics,
            features = summary.features,
            stories = summary.stories,
            rejected_lines = summary.rejected_lines,
            "Backlog generated"
        );

        if !outcome.degraded {
            self.cache.insert(fingerprint, outcome.clone()).await;
        }
        Ok(outcome)
    }
}
