//! Generation request, skill levels and the reproducibility seed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{BacklogError, BacklogResult};

/// Developer proficiency tier used to scale effort estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl SkillLevel {
    /// Resolve a user-supplied label.
    ///
    /// French and English labels are accepted, with or without accents.
    /// Anything unrecognized resolves to [`SkillLevel::Intermediate`].
    pub fn from_label(label: &str) -> Self {
        let folded: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'é' | 'è' | 'ê' | 'ë' => 'e',
                'à' | 'â' => 'a',
                'î' | 'ï' => 'i',
                other => other,
            })
            .collect();

        match folded.as_str() {
            "debutant" | "beginner" | "junior" | "novice" => Self::Beginner,
            "expert" | "senior" | "advanced" => Self::Expert,
            _ => Self::Intermediate,
        }
    }

    /// Effort in person-days of a 1-point story at this level.
    pub fn base_effort_days(self) -> f64 {
        match self {
            Self::Beginner => 1.0,
            Self::Intermediate => 0.125,
            Self::Expert => 0.0625,
        }
    }

    /// Label used in prompts and documents.
    pub fn label(self) -> &'static str {
        match self {
            Self::Beginner => "Débutant",
            Self::Intermediate => "Intermédiaire",
            Self::Expert => "Expert",
        }
    }
}

impl std::fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 32-bit seed passed to providers that support reproducible sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(pub i32);

impl Seed {
    pub fn value(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated backlog generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    specification: String,
    technologies: Vec<String>,
    skill_level: SkillLevel,
}

impl GenerationRequest {
    /// Build a request, rejecting empty specification text, technology list or level label.
    pub fn new(
        specification: impl Into<String>,
        technologies: Vec<String>,
        skill_level_label: &str,
    ) -> BacklogResult<Self> {
        let specification = specification.into();
        let technologies: Vec<String> = technologies
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if specification.trim().is_empty() {
            return Err(BacklogError::validation("specification text is empty"));
        }
        if technologies.is_empty() {
            return Err(BacklogError::validation("technology list is empty"));
        }
        if skill_level_label.trim().is_empty() {
            return Err(BacklogError::validation("skill level is empty"));
        }

        Ok(Self {
            specification,
            technologies,
            skill_level: SkillLevel::from_label(skill_level_label),
        })
    }

    pub fn specification(&self) -> &str {
        &self.specification
    }

    pub fn technologies(&self) -> &[String] {
        &self.technologies
    }

    pub fn skill_level(&self) -> SkillLevel {
        self.skill_level
    }

    /// SHA-256 over the canonical form: specification, sorted technologies, level.
    fn digest(&self) -> [u8; 32] {
        let mut technologies = self.technologies.clone();
        technologies.sort();

        let mut hasher = Sha256::new();
        hasher.update(self.specification.as_bytes());
        hasher.update([0x1f]);
        hasher.update(technologies.join("\u{1e}").as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.skill_level.label().as_bytes());
        hasher.finalize().into()
    }

    /// Hex fingerprint identifying the request content.
    pub fn fingerprint(&self) -> String {
        hex::encode(self.digest())
    }

    /// Seed derived from the first four bytes of the fingerprint.
    pub fn seed(&self) -> Seed {
        let digest = self.digest();
        Seed(i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }
}
