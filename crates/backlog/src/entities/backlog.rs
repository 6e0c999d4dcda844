//! Backlog hierarchy: epics, features and user stories.

use serde::{Deserialize, Serialize};

use crate::errors::BacklogError;

/// Complexity points on the restricted Fibonacci scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StoryPoints {
    One,
    Three,
    Five,
    Eight,
    Thirteen,
}

impl StoryPoints {
    /// All valid point values, ascending.
    pub const ALL: [Self; 5] = [Self::One, Self::Three, Self::Five, Self::Eight, Self::Thirteen];

    pub fn value(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Three => 3,
            Self::Five => 5,
            Self::Eight => 8,
            Self::Thirteen => 13,
        }
    }
}

impl TryFrom<u8> for StoryPoints {
    type Error = BacklogError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            3 => Ok(Self::Three),
            5 => Ok(Self::Five),
            8 => Ok(Self::Eight),
            13 => Ok(Self::Thirteen),
            other => Err(BacklogError::validation(format!(
                "{other} is not a valid story point value (expected 1, 3, 5, 8 or 13)"
            ))),
        }
    }
}

impl From<StoryPoints> for u8 {
    fn from(points: StoryPoints) -> Self {
        points.value()
    }
}

impl std::fmt::Display for StoryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A user story with its estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// "As a <role>, I want <goal> so that <benefit>"
    pub text: String,
    pub points: StoryPoints,
    /// Estimated effort in person-days (always positive)
    #[serde(rename = "effortDays")]
    pub effort_days: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stories: Vec<Story>,
}

impl Feature {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            stories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Epic {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Epic {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            features: Vec::new(),
        }
    }

    /// Iterate over every story of every feature in order.
    pub fn stories(&self) -> impl Iterator<Item = &Story> {
        self.features.iter().flat_map(|f| f.stories.iter())
    }
}

/// Ordered sequence of epics, in first-seen order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backlog {
    pub epics: Vec<Epic>,
}

impl Backlog {
    pub fn new(epics: Vec<Epic>) -> Self {
        Self { epics }
    }

    /// True when no epic was found at all.
    pub fn is_empty(&self) -> bool {
        self.epics.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.epics.iter().map(|e| e.features.len()).sum()
    }

    pub fn story_count(&self) -> usize {
        self.epics.iter().map(|e| e.stories().count()).sum()
    }

    pub fn total_points(&self) -> u32 {
        self.epics
            .iter()
            .flat_map(Epic::stories)
            .map(|s| u32::from(s.points.value()))
            .sum()
    }

    pub fn total_effort_days(&self) -> f64 {
        self.epics
            .iter()
            .flat_map(Epic::stories)
            .map(|s| s.effort_days)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(points: StoryPoints, effort: f64) -> Story {
        Story {
            text: "As a user, I want to log in so that I access my data".to_string(),
            points,
            effort_days: effort,
        }
    }

    #[test]
    fn test_points_accept_only_fibonacci_subset() {
        for value in [1u8, 3, 5, 8, 13] {
            assert_eq!(StoryPoints::try_from(value).unwrap().value(), value);
        }
        for value in [0u8, 2, 4, 21] {
            assert!(StoryPoints::try_from(value).is_err());
        }
    }

    #[test]
    fn test_points_serialize_as_numbers() {
        let json = serde_json::to_string(&story(StoryPoints::Eight, 1.0)).unwrap();
        assert!(json.contains("\"points\":8"));
        assert!(json.contains("\"effortDays\":1.0"));

        let bad = r#"{"text":"x","points":4,"effortDays":1.0}"#;
        assert!(serde_json::from_str::<Story>(bad).is_err());
    }

    #[test]
    fn test_backlog_totals() {
        let mut feature = Feature::new("Auth", "");
        feature.stories.push(story(StoryPoints::Three, 0.375));
        feature.stories.push(story(StoryPoints::Five, 0.625));
        let mut epic = Epic::new("Core", "");
        epic.features.push(feature);
        let backlog = Backlog::new(vec![epic]);

        assert!(!backlog.is_empty());
        assert_eq!(backlog.feature_count(), 1);
        assert_eq!(backlog.story_count(), 2);
        assert_eq!(backlog.total_points(), 8);
        assert!((backlog.total_effort_days() - 1.0).abs() < 1e-9);
    }
}
