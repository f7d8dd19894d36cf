//! Lesson Orchestrator
//!
//! Tracks everything one tutoring session knows about the learner: which screen
//! is active, the analyzed outline, the topic being studied and which lessons
//! have been completed. Views read from this state; only the operations below
//! change it.

use crate::{
    error::TutorError,
    material::truncate_material,
    quiz::QuizResult,
    topic::{Difficulty, Topic, TopicData, is_unlocked},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// The coarse-grained screen a session is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Upload,
    Learning,
    Quiz,
    Progress,
    ConceptMap,
    Recap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    Visual,
    Auditory,
    #[default]
    Reading,
    Kinesthetic,
}

impl LearningStyle {
    /// A short instruction describing how explanations should be shaped.
    pub fn guidance(&self) -> &'static str {
        match self {
            LearningStyle::Visual => {
                "Use diagrams described in words, spatial analogies and structured lists."
            }
            LearningStyle::Auditory => {
                "Explain conversationally, as if speaking, with memorable phrasing."
            }
            LearningStyle::Reading => "Give clear written explanations with precise definitions.",
            LearningStyle::Kinesthetic => {
                "Ground every idea in hands-on examples and small exercises."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Completed,
    Available,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub name: String,
    pub order: u32,
    pub status: TopicStatus,
    pub estimated_minutes: u32,
}

/// Data for the progress view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub total_topics: usize,
    pub completed_topics: usize,
    pub percent_complete: u32,
    pub total_minutes: u32,
    pub remaining_minutes: u32,
    pub topics: Vec<TopicProgress>,
}

/// Data for the recap view of the current topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recap {
    pub topic: String,
    pub subtopics: Vec<String>,
    pub key_concepts: Vec<String>,
    pub completed: bool,
    pub next_topic: Option<String>,
}

/// The topic/difficulty/style bundle forwarded with every generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContext {
    pub title: String,
    pub topic: String,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub key_concepts: Vec<String>,
    pub learning_style: LearningStyle,
}

impl LessonContext {
    /// Renders the context as a prompt section.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Course: {}\nTopic: {}\nDifficulty: {}\n",
            self.title, self.topic, self.difficulty
        );
        if let Some(sub) = &self.subtopic {
            out.push_str(&format!("Subtopic: {}\n", sub));
        }
        if !self.key_concepts.is_empty() {
            out.push_str(&format!("Key concepts: {}\n", self.key_concepts.join(", ")));
        }
        out.push_str(&format!(
            "Learning style: {:?}. {}",
            self.learning_style,
            self.learning_style.guidance()
        ));
        out
    }
}

/// State of one tutoring session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonOrchestrator {
    pub view_mode: ViewMode,
    pub topic_data: Option<TopicData>,
    pub current_topic: Option<String>,
    pub current_subtopic: Option<String>,
    pub completed_lessons: HashSet<String>,
    pub learning_style: LearningStyle,
    #[serde(skip)]
    material: Option<String>,
}

impl LessonOrchestrator {
    pub fn new(learning_style: LearningStyle) -> Self {
        Self {
            learning_style,
            ..Default::default()
        }
    }

    /// The analyzed material, already capped to the request size limit.
    pub fn material(&self) -> Option<&str> {
        self.material.as_deref()
    }

    /// Stores a freshly analyzed outline and opens its first topic.
    ///
    /// This is the only way out of the upload view. Earlier progress is
    /// discarded because it referred to a different outline.
    pub fn load_topic_data(&mut self, material: &str, topic_data: TopicData) {
        let first = topic_data.ordered().first().map(|t| t.name.clone());
        info!(
            title = %topic_data.title,
            topics = topic_data.topics.len(),
            "Loaded analyzed material"
        );
        self.material = Some(truncate_material(material).to_string());
        self.topic_data = Some(topic_data);
        self.completed_lessons.clear();
        self.current_topic = first;
        self.current_subtopic = None;
        self.view_mode = ViewMode::Learning;
    }

    /// Opens a topic in the learning view.
    ///
    /// Availability is not checked here: a locked topic can still be opened by a
    /// direct call. Use [`Self::select_unlocked_topic`] to enforce the unlock order.
    pub fn select_topic(&mut self, name: &str, subtopic: Option<&str>) {
        debug!(topic = name, ?subtopic, "Selecting topic");
        self.current_topic = Some(name.to_string());
        self.current_subtopic = subtopic.map(str::to_string);
        self.view_mode = ViewMode::Learning;
    }

    /// Opens a topic only if it exists and is unlocked.
    pub fn select_unlocked_topic(
        &mut self,
        name: &str,
        subtopic: Option<&str>,
    ) -> Result<(), TutorError> {
        let data = self.topic_data.as_ref().ok_or(TutorError::NoTopicData)?;
        if data.topic(name).is_none() {
            return Err(TutorError::TopicNotFound(name.to_string()));
        }
        if !self.is_available(name) {
            return Err(TutorError::TopicLocked(name.to_string()));
        }
        self.select_topic(name, subtopic);
        Ok(())
    }

    /// Marks a lesson as completed. Completing it again has no further effect.
    pub fn complete_lesson(&mut self, name: &str) {
        if self.completed_lessons.insert(name.to_string()) {
            info!(topic = name, "Lesson completed");
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        debug!(from = ?self.view_mode, to = ?mode, "Switching view");
        self.view_mode = mode;
    }

    /// Applies a finished quiz on `topic`: a passing score completes it.
    ///
    /// A result for a topic that is no longer the current one is ignored.
    /// Returns the topic that was completed, if any.
    pub fn record_quiz_result(&mut self, topic: &str, result: &QuizResult) -> Option<String> {
        info!(
            topic = %topic,
            score = result.score,
            total = result.total,
            percentage = result.percentage,
            passed = result.passed,
            "Quiz finished"
        );
        if self.current_topic.as_deref() != Some(topic) {
            warn!(
                topic = %topic,
                current = ?self.current_topic,
                "Ignoring quiz result for a topic that is no longer open"
            );
            return None;
        }
        if result.passed {
            self.complete_lesson(topic);
            Some(topic.to_string())
        } else {
            None
        }
    }

    /// Whether a topic may be studied under the unlock order.
    ///
    /// Unknown names are never available.
    pub fn is_available(&self, name: &str) -> bool {
        let Some(data) = &self.topic_data else {
            return false;
        };
        let ordered = data.ordered();
        ordered
            .iter()
            .position(|t| t.name == name)
            .is_some_and(|i| is_unlocked(&ordered, i, &self.completed_lessons))
    }

    pub fn available_topics(&self) -> Vec<&Topic> {
        let Some(data) = &self.topic_data else {
            return Vec::new();
        };
        let ordered = data.ordered();
        ordered
            .iter()
            .enumerate()
            .filter(|(i, _)| is_unlocked(&ordered, *i, &self.completed_lessons))
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn topic_statuses(&self) -> Vec<TopicProgress> {
        let Some(data) = &self.topic_data else {
            return Vec::new();
        };
        let ordered = data.ordered();
        ordered
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let status = if self.completed_lessons.contains(&t.name) {
                    TopicStatus::Completed
                } else if is_unlocked(&ordered, i, &self.completed_lessons) {
                    TopicStatus::Available
                } else {
                    TopicStatus::Locked
                };
                TopicProgress {
                    name: t.name.clone(),
                    order: t.order,
                    status,
                    estimated_minutes: t.estimated_minutes,
                }
            })
            .collect()
    }

    pub fn progress_report(&self) -> ProgressReport {
        let topics = self.topic_statuses();
        let total_topics = topics.len();
        let completed_topics = topics
            .iter()
            .filter(|t| t.status == TopicStatus::Completed)
            .count();
        let total_minutes: u32 = topics.iter().map(|t| t.estimated_minutes).sum();
        let remaining_minutes = topics
            .iter()
            .filter(|t| t.status != TopicStatus::Completed)
            .map(|t| t.estimated_minutes)
            .sum();
        let percent_complete = if total_topics == 0 {
            0
        } else {
            ((completed_topics as f64 / total_topics as f64) * 100.0).round() as u32
        };
        ProgressReport {
            total_topics,
            completed_topics,
            percent_complete,
            total_minutes,
            remaining_minutes,
            topics,
        }
    }

    /// The first unlocked, not yet completed topic after the current one.
    pub fn next_topic(&self) -> Option<&Topic> {
        let data = self.topic_data.as_ref()?;
        let ordered = data.ordered();
        let start = self
            .current_topic
            .as_deref()
            .and_then(|name| ordered.iter().position(|t| t.name == name))
            .map_or(0, |i| i + 1);
        ordered
            .iter()
            .enumerate()
            .skip(start)
            .find(|(i, t)| {
                !self.completed_lessons.contains(&t.name)
                    && is_unlocked(&ordered, *i, &self.completed_lessons)
            })
            .map(|(_, t)| *t)
    }

    pub fn recap(&self) -> Result<Recap, TutorError> {
        let name = self
            .current_topic
            .as_deref()
            .ok_or(TutorError::NoTopicSelected)?;
        let topic = self
            .topic_data
            .as_ref()
            .ok_or(TutorError::NoTopicData)?
            .topic(name)
            .ok_or_else(|| TutorError::TopicNotFound(name.to_string()))?;
        Ok(Recap {
            topic: topic.name.clone(),
            subtopics: topic.subtopics.clone(),
            key_concepts: topic.key_concepts.clone(),
            completed: self.completed_lessons.contains(&topic.name),
            next_topic: self.next_topic().map(|t| t.name.clone()),
        })
    }

    /// Builds the context bundle for the current topic.
    pub fn lesson_context(&self) -> Result<LessonContext, TutorError> {
        let data = self.topic_data.as_ref().ok_or(TutorError::NoTopicData)?;
        let name = self
            .current_topic
            .as_deref()
            .ok_or(TutorError::NoTopicSelected)?;
        // A topic opened by direct selection may not be part of the outline.
        let (difficulty, key_concepts) = data
            .topic(name)
            .map(|t| (t.difficulty, t.key_concepts.clone()))
            .unwrap_or((data.overall_difficulty, Vec::new()));
        Ok(LessonContext {
            title: data.title.clone(),
            topic: name.to_string(),
            subtopic: self.current_subtopic.clone(),
            difficulty,
            key_concepts,
            learning_style: self.learning_style,
        })
    }
}
