//! Core data structures for backlog generation.

mod backlog;
mod request;

pub use backlog::{Backlog, Epic, Feature, Story, StoryPoints};
pub use request::{GenerationRequest, Seed, SkillLevel};
