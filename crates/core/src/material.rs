//! Material Ingestion Service
//!
//! Turns pasted text or an uploaded document into a topic outline. Extraction is
//! local; summarization into topics is delegated to a `MaterialAnalyzer`.

use crate::{
    error::TutorError,
    llm_client::{ChatTurn, LLMClient, parse_json_answer},
    prompts::Prompts,
    topic::{ConceptEdge, ConceptMap, ConceptNode, Difficulty, Topic, TopicData},
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Material forwarded to generation calls is capped to this many characters.
pub const MATERIAL_CHAR_LIMIT: usize = 10_000;

const TEXT_EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
];

fn is_text_mime(mime: &str) -> bool {
    TEXT_EXTENSIONS.iter().any(|(_, m)| *m == mime)
}

/// Extracts plain text from an uploaded file.
///
/// Only text-based formats are accepted. When the browser sends a generic mime
/// type, the file extension decides.
pub fn extract_text(file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<String, TutorError> {
    let mime = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let supported = if mime.is_empty() || mime == "application/octet-stream" {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        TEXT_EXTENSIONS.iter().any(|(ext, _)| *ext == extension)
    } else {
        is_text_mime(&mime)
    };
    if !supported {
        warn!(file_name, mime_type, "Rejected upload with unsupported type");
        return Err(TutorError::UnsupportedFileType(if mime.is_empty() {
            file_name.to_string()
        } else {
            mime
        }));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|e| TutorError::CorruptFile(e.to_string()))?
        .trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(TutorError::EmptyMaterial);
    }
    Ok(text.to_string())
}

/// Returns at most the first `MATERIAL_CHAR_LIMIT` characters of `text`.
pub fn truncate_material(text: &str) -> &str {
    match text.char_indices().nth(MATERIAL_CHAR_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Defines the contract for any service that can outline learning material.
#[async_trait]
pub trait MaterialAnalyzer: Send + Sync {
    /// Summarizes `text` into an ordered topic outline.
    async fn analyze(&self, text: &str) -> Result<TopicData>;
}

/// An implementation of `MaterialAnalyzer` backed by an LLM.
pub struct LLMMaterialAnalyzer {
    client: Arc<dyn LLMClient>,
    prompts: Arc<Prompts>,
}

impl LLMMaterialAnalyzer {
    /// Creates a new analyzer.
    ///
    /// `prompts` must contain an `analyze_material` template.
    pub fn new(client: Arc<dyn LLMClient>, prompts: Arc<Prompts>) -> Self {
        Self { client, prompts }
    }
}

#[async_trait]
impl MaterialAnalyzer for LLMMaterialAnalyzer {
    async fn analyze(&self, text: &str) -> Result<TopicData> {
        if text.trim().is_empty() {
            return Err(TutorError::EmptyMaterial.into());
        }
        let material = truncate_material(text);
        let prompt = self
            .prompts
            .render("analyze_material", &[("material", material)])?;

        let answer = self
            .client
            .complete(
                "You are an expert teacher who organizes study material into lessons.".to_string(),
                vec![ChatTurn::user(prompt)],
            )
            .await?;

        let outline: TopicData = parse_json_answer(&answer)
            .map_err(|e| TutorError::MalformedResponse(e.to_string()))?;
        let outline = outline.validate()?;
        info!(
            title = %outline.title,
            topics = outline.topics.len(),
            "Material analyzed"
        );
        Ok(outline)
    }
}

/// A mock `MaterialAnalyzer` for development and integration testing.
///
/// The outline is derived from the first sentence of the material so output is
/// deterministic and needs no network access.
pub struct MockMaterialAnalyzer;

#[async_trait]
impl MaterialAnalyzer for MockMaterialAnalyzer {
    async fn analyze(&self, text: &str) -> Result<TopicData> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TutorError::EmptyMaterial.into());
        }
        let subject: String = text
            .split(['.', '\n'])
            .next()
            .unwrap_or(text)
            .split_whitespace()
            .take(3)
            .collect::<Vec<_>>()
            .join(" ");

        let stages = [
            (format!("Introduction to {}", subject), Difficulty::Beginner),
            ("Core Concepts".to_string(), Difficulty::Intermediate),
            ("Practical Applications".to_string(), Difficulty::Advanced),
        ];
        let topics: Vec<Topic> = stages
            .into_iter()
            .enumerate()
            .map(|(i, (name, difficulty))| Topic {
                subtopics: vec![format!("{} overview", name), format!("{} in depth", name)],
                key_concepts: vec![subject.clone()],
                difficulty,
                estimated_minutes: 15,
                order: i as u32 + 1,
                name,
            })
            .collect();

        let concept_map = ConceptMap {
            nodes: topics
                .iter()
                .map(|t| ConceptNode {
                    id: format!("t{}", t.order),
                    label: t.name.clone(),
                    topic: Some(t.name.clone()),
                })
                .collect(),
            edges: topics
                .windows(2)
                .map(|pair| ConceptEdge {
                    from: format!("t{}", pair[0].order),
                    to: format!("t{}", pair[1].order),
                    relation: "leads to".to_string(),
                })
                .collect(),
        };

        Ok(TopicData {
            title: subject.clone(),
            topics,
            overall_difficulty: Difficulty::Intermediate,
            total_estimated_minutes: 45,
            learning_objectives: vec![format!("Explain {}", subject)],
            prerequisites: Vec::new(),
            concept_map,
        }
        .validate()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLLMClient;

    fn prompts() -> Arc<Prompts> {
        Arc::new(Prompts::from_pairs([(
            "analyze_material",
            "Outline this:\n{material}",
        )]))
    }

    #[test]
    fn extracts_plain_text_and_markdown() {
        assert_eq!(
            extract_text("notes.txt", "text/plain; charset=utf-8", b"Cells divide.").unwrap(),
            "Cells divide."
        );
        assert_eq!(
            extract_text("notes.md", "application/octet-stream", b"# Cells").unwrap(),
            "# Cells"
        );
    }

    #[test]
    fn rejects_unsupported_and_empty_files() {
        assert_eq!(
            extract_text("slides.pptx", "application/vnd.ms-powerpoint", b"PK"),
            Err(TutorError::UnsupportedFileType(
                "application/vnd.ms-powerpoint".into()
            ))
        );
        assert_eq!(
            extract_text("blank.txt", "text/plain", b"  \n\t"),
            Err(TutorError::EmptyMaterial)
        );
        assert!(matches!(
            extract_text("bad.txt", "text/plain", &[0xff, 0xfe, 0x00]),
            Err(TutorError::CorruptFile(_))
        ));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(MATERIAL_CHAR_LIMIT + 5);
        let cut = truncate_material(&long);
        assert_eq!(cut.chars().count(), MATERIAL_CHAR_LIMIT);
        assert_eq!(truncate_material("short"), "short");
    }

    #[tokio::test]
    async fn mock_analyzer_outlines_photosynthesis() {
        let outline = MockMaterialAnalyzer
            .analyze("Photosynthesis converts light into chemical energy...")
            .await
            .unwrap();
        assert_eq!(outline.topics[0].order, 1);
        assert_eq!(outline.topics[0].name, "Introduction to Photosynthesis converts light");
        assert_eq!(outline.concept_map.edges.len(), 2);
    }

    #[tokio::test]
    async fn llm_analyzer_parses_and_orders_outline() {
        let mut client = MockLLMClient::new();
        client
            .expect_complete()
            .withf(|_, turns| turns[0].content.contains("Photosynthesis"))
            .times(1)
            .returning(|_, _| {
                Ok(r#"```json
                {"title": "Photosynthesis", "topics": [
                    {"name": "Calvin cycle", "order": 2},
                    {"name": "Light reactions", "order": 1}
                ]}
                ```"#
                    .to_string())
            });
        let analyzer = LLMMaterialAnalyzer::new(Arc::new(client), prompts());

        let outline = analyzer
            .analyze("Photosynthesis converts light into chemical energy...")
            .await
            .unwrap();
        assert_eq!(outline.topics[0].name, "Light reactions");
        assert_eq!(outline.topics[0].order, 1);
    }

    #[tokio::test]
    async fn llm_analyzer_reports_malformed_output() {
        let mut client = MockLLMClient::new();
        client
            .expect_complete()
            .returning(|_, _| Ok("{\"title\": \"x\", \"topics\": []}".to_string()));
        let analyzer = LLMMaterialAnalyzer::new(Arc::new(client), prompts());

        let err = analyzer.analyze("Some text").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TutorError>(),
            Some(TutorError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn blank_material_is_rejected_before_any_request() {
        let client = MockLLMClient::new();
        let analyzer = LLMMaterialAnalyzer::new(Arc::new(client), prompts());
        let err = analyzer.analyze("   ").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<TutorError>(),
            Some(&TutorError::EmptyMaterial)
        );
    }
}
