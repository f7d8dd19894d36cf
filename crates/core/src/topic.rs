use crate::error::TutorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How demanding a topic (or a whole outline) is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
        }
    }
}

/// A single unit of learning content inside an outline.
///
/// `order` defines the linear unlock sequence: a topic becomes available once
/// the topic immediately before it has been completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub estimated_minutes: u32,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub relation: String,
}

/// Relationships between the concepts of an outline, rendered as a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMap {
    #[serde(default)]
    pub nodes: Vec<ConceptNode>,
    #[serde(default)]
    pub edges: Vec<ConceptEdge>,
}

/// The outline produced by analyzing a piece of learning material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicData {
    pub title: String,
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub overall_difficulty: Difficulty,
    #[serde(default)]
    pub total_estimated_minutes: u32,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub concept_map: ConceptMap,
}

impl TopicData {
    /// Checks the outline is usable and puts topics in unlock order.
    ///
    /// Generated outlines are untrusted: an empty topic list or duplicate names
    /// would break the unlock chain, so both are rejected.
    pub fn validate(mut self) -> Result<Self, TutorError> {
        if self.topics.is_empty() {
            return Err(TutorError::MalformedResponse(
                "outline contains no topics".to_string(),
            ));
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for topic in &self.topics {
            if topic.name.trim().is_empty() {
                return Err(TutorError::MalformedResponse(
                    "topic with an empty name".to_string(),
                ));
            }
            if !seen.insert(topic.name.as_str()) {
                return Err(TutorError::MalformedResponse(format!(
                    "duplicate topic '{}'",
                    topic.name
                )));
            }
        }
        self.topics.sort_by_key(|t| t.order);
        if self.total_estimated_minutes == 0 {
            self.total_estimated_minutes = self.topics.iter().map(|t| t.estimated_minutes).sum();
        }
        Ok(self)
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    /// Topics in unlock order, regardless of how they were stored.
    pub fn ordered(&self) -> Vec<&Topic> {
        let mut topics: Vec<&Topic> = self.topics.iter().collect();
        topics.sort_by_key(|t| t.order);
        topics
    }
}

/// Whether the topic at `index` (in unlock order) can be studied.
///
/// The first topic is always open; every later one needs its immediate
/// predecessor to be in `completed`.
pub fn is_unlocked(ordered: &[&Topic], index: usize, completed: &HashSet<String>) -> bool {
    index == 0
        || ordered
            .get(index - 1)
            .is_some_and(|prev| completed.contains(&prev.name))
}
