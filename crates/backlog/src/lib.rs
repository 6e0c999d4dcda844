#![warn(clippy::pedantic)]
// Allow common pedantic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

//! # Backlog
//!
//! Agile backlog generation from project specifications.
//!
//! This crate provides:
//! - Text extraction from raw text or uploaded PDF specifications
//! - A two-stage LLM pipeline (requirements analysis, then backlog) with
//!   OpenAI as primary provider and Anthropic as fallback
//! - A tolerant line parser turning model output into epics, features and stories
//! - PDF and spreadsheet export
//! - An HTTP service and a CLI
//!
//! ## Example
//!
//! ```rust,ignore
//! use backlog::{BacklogGenerator, Config, GenerationRequest};
//!
//! let generator = BacklogGenerator::from_config(&Config::from_env())?;
//! let request = GenerationRequest::new(spec, vec!["Rust".into()], "Expert")?;
//! let outcome = generator.generate(&request).await?;
//! println!("{}", outcome.backlog_text);
//! ```

// Core entities
pub mod entities;

// Error types
pub mod errors;

// Configuration
pub mod config;

// AI integration
pub mod ai;

// Extraction, parsing, generation, export
pub mod domain;

// HTTP service
pub mod server;

// Re-export key types for convenience
pub use config::Config;
pub use domain::{parse, parse_with_report, BacklogGenerator, ExportFormat, GenerationOutcome};
pub use entities::{Backlog, Epic, Feature, GenerationRequest, Seed, SkillLevel, Story, StoryPoints};
pub use errors::{BacklogError, BacklogResult};
