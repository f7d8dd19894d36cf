//! Quiz Engine
//!
//! One `QuizAttempt` covers a single batch of generated questions for a topic.
//! The attempt walks through
//! `configuring → generating → answering ⇄ feedback_shown → complete`, with a
//! `no_questions` dead end when generation yields nothing.

use crate::{
    error::TutorError,
    llm_client::{ChatTurn, LLMClient, parse_json_answer},
    prompts::Prompts,
    session::LessonContext,
    topic::Difficulty,
};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, info, warn};

pub const MIN_QUESTIONS: i64 = 1;
pub const MAX_QUESTIONS: i64 = 20;
/// Minimum percentage needed to pass a quiz and complete its topic.
pub const PASS_PERCENTAGE: u32 = 70;

/// Checks a requested question count before anything is generated.
pub fn validate_question_count(count: i64) -> Result<usize, TutorError> {
    if (MIN_QUESTIONS..=MAX_QUESTIONS).contains(&count) {
        Ok(count as usize)
    } else {
        Err(TutorError::InvalidQuestionCount(count))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub concept: String,
}

impl Question {
    fn is_well_formed(&self) -> bool {
        if self.question.trim().is_empty() || self.correct_answer.trim().is_empty() {
            return false;
        }
        match self.kind {
            QuestionType::MultipleChoice => self
                .options
                .as_ref()
                .is_some_and(|o| {
                    o.len() >= 2 && o.iter().any(|opt| same_answer(opt, &self.correct_answer))
                }),
            QuestionType::ShortAnswer => true,
        }
    }

    /// The question as shown while answering, without the answer key.
    pub fn view(&self, index: usize, total: usize) -> QuestionView {
        QuestionView {
            index,
            total,
            kind: self.kind,
            question: self.question.clone(),
            options: self.options.clone(),
            difficulty: self.difficulty,
            concept: self.concept.clone(),
        }
    }

    fn local_feedback(&self, answer: &str) -> AnswerFeedback {
        let is_correct = same_answer(answer, &self.correct_answer);
        let feedback = if is_correct {
            format!("Correct! {}", self.explanation)
        } else {
            format!(
                "Not quite. The correct answer is \"{}\". {}",
                self.correct_answer, self.explanation
            )
        };
        AnswerFeedback {
            is_correct,
            feedback: feedback.trim_end().to_string(),
        }
    }
}

fn same_answer(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub difficulty: Difficulty,
    pub concept: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub feedback: String,
}

/// Final score of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub passed: bool,
}

impl QuizResult {
    pub fn new(score: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((score as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            score,
            total,
            percentage,
            passed: percentage >= PASS_PERCENTAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    Configuring,
    Generating,
    Answering,
    FeedbackShown,
    Complete,
    NoQuestions,
}

impl fmt::Display for QuizPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuizPhase::Configuring => "configuring",
            QuizPhase::Generating => "generating",
            QuizPhase::Answering => "answering",
            QuizPhase::FeedbackShown => "feedback_shown",
            QuizPhase::Complete => "complete",
            QuizPhase::NoQuestions => "no_questions",
        };
        f.write_str(s)
    }
}

/// What follows a `next()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizStep {
    Question { question: QuestionView },
    Complete { result: QuizResult },
}

/// Source of questions and grading for quizzes.
#[async_trait]
pub trait QuizService: Send + Sync {
    /// Generates up to `count` questions for the lesson.
    async fn generate_questions(
        &self,
        context: &LessonContext,
        count: usize,
    ) -> Result<Vec<Question>>;

    /// Grades one answer to `question`.
    async fn grade_answer(&self, question: &Question, answer: &str) -> Result<AnswerFeedback>;
}

pub struct QuizAttempt {
    topic: String,
    phase: QuizPhase,
    questions: Vec<Question>,
    index: usize,
    correct: usize,
}

impl QuizAttempt {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            phase: QuizPhase::Configuring,
            questions: Vec::new(),
            index: 0,
            correct: 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn score(&self) -> usize {
        self.correct
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current_question(&self) -> Option<QuestionView> {
        match self.phase {
            QuizPhase::Answering | QuizPhase::FeedbackShown => self
                .questions
                .get(self.index)
                .map(|q| q.view(self.index, self.questions.len())),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<QuizResult> {
        (self.phase == QuizPhase::Complete)
            .then(|| QuizResult::new(self.correct, self.questions.len()))
    }

    fn expect_phase(&self, expected: QuizPhase, action: &'static str) -> Result<(), TutorError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(TutorError::InvalidQuizState {
                action,
                phase: self.phase.to_string(),
            })
        }
    }

    /// Validates `requested` and fetches the question batch.
    ///
    /// An invalid count is rejected before any request is made. A failed or
    /// empty fetch leaves the attempt in `no_questions`; there is no retry.
    pub async fn start(
        &mut self,
        service: &dyn QuizService,
        context: &LessonContext,
        requested: i64,
    ) -> Result<QuizPhase, TutorError> {
        self.expect_phase(QuizPhase::Configuring, "start")?;
        let count = validate_question_count(requested)?;

        self.phase = QuizPhase::Generating;
        debug!(topic = %self.topic, count, "Generating quiz questions");
        let questions = match service.generate_questions(context, count).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!(topic = %self.topic, error = ?e, "Quiz generation failed");
                Vec::new()
            }
        };

        self.questions = questions
            .into_iter()
            .filter(Question::is_well_formed)
            .take(count)
            .collect();
        self.index = 0;
        self.correct = 0;
        self.phase = if self.questions.is_empty() {
            QuizPhase::NoQuestions
        } else {
            QuizPhase::Answering
        };
        info!(topic = %self.topic, questions = self.questions.len(), phase = %self.phase, "Quiz ready");
        Ok(self.phase)
    }

    /// Grades `selection` against the current question.
    pub async fn answer(
        &mut self,
        service: &dyn QuizService,
        selection: &str,
    ) -> Result<AnswerFeedback, TutorError> {
        self.expect_phase(QuizPhase::Answering, "answer")?;
        let question = &self.questions[self.index];
        let feedback = match service.grade_answer(question, selection).await {
            Ok(feedback) => feedback,
            Err(e) => {
                warn!(error = ?e, "Grading call failed; comparing against the answer key");
                question.local_feedback(selection)
            }
        };
        if feedback.is_correct {
            self.correct += 1;
        }
        self.phase = QuizPhase::FeedbackShown;
        Ok(feedback)
    }

    /// Moves to the next question, or completes the attempt after the last one.
    pub fn next(&mut self) -> Result<QuizStep, TutorError> {
        self.expect_phase(QuizPhase::FeedbackShown, "next")?;
        if self.index + 1 < self.questions.len() {
            self.index += 1;
            self.phase = QuizPhase::Answering;
            Ok(QuizStep::Question {
                question: self.questions[self.index].view(self.index, self.questions.len()),
            })
        } else {
            self.phase = QuizPhase::Complete;
            let result = QuizResult::new(self.correct, self.questions.len());
            Ok(QuizStep::Complete { result })
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionBatch {
    List(Vec<Question>),
    Wrapped { questions: Vec<Question> },
}

/// A `QuizService` backed by an LLM.
///
/// Multiple-choice answers are checked against the answer key directly; only
/// short answers go to the model for grading.
pub struct LLMQuizService {
    client: Arc<dyn LLMClient>,
    prompts: Arc<Prompts>,
}

impl LLMQuizService {
    /// `prompts` must contain `generate_quiz` and `grade_answer` templates.
    pub fn new(client: Arc<dyn LLMClient>, prompts: Arc<Prompts>) -> Self {
        Self { client, prompts }
    }
}

#[async_trait]
impl QuizService for LLMQuizService {
    async fn generate_questions(
        &self,
        context: &LessonContext,
        count: usize,
    ) -> Result<Vec<Question>> {
        let count = count.to_string();
        let context = context.describe();
        let prompt = self.prompts.render(
            "generate_quiz",
            &[("count", count.as_str()), ("context", context.as_str())],
        )?;
        let answer = self
            .client
            .complete(
                "You write fair, unambiguous quiz questions and answer only with JSON.".to_string(),
                vec![ChatTurn::user(prompt)],
            )
            .await?;
        let questions = match parse_json_answer::<QuestionBatch>(&answer)
            .map_err(|e| TutorError::MalformedResponse(e.to_string()))?
        {
            QuestionBatch::List(questions) => questions,
            QuestionBatch::Wrapped { questions } => questions,
        };
        Ok(questions)
    }

    async fn grade_answer(&self, question: &Question, answer: &str) -> Result<AnswerFeedback> {
        if question.kind == QuestionType::MultipleChoice {
            return Ok(question.local_feedback(answer));
        }
        let prompt = self.prompts.render(
            "grade_answer",
            &[
                ("question", question.question.as_str()),
                ("expected", question.correct_answer.as_str()),
                ("answer", answer),
            ],
        )?;
        let reply = self
            .client
            .complete(
                "You grade short answers generously but accurately and answer only with JSON."
                    .to_string(),
                vec![ChatTurn::user(prompt)],
            )
            .await?;
        Ok(parse_json_answer(&reply).map_err(|e| TutorError::MalformedResponse(e.to_string()))?)
    }
}

/// A deterministic `QuizService` for development and testing.
pub struct MockQuizService;

#[async_trait]
impl QuizService for MockQuizService {
    async fn generate_questions(
        &self,
        context: &LessonContext,
        count: usize,
    ) -> Result<Vec<Question>> {
        Ok((0..count)
            .map(|i| Question {
                kind: QuestionType::MultipleChoice,
                question: format!(
                    "Question {} about {}: which option is correct?",
                    i + 1,
                    context.topic
                ),
                options: Some(vec![
                    "A".to_string(),
                    "B".to_string(),
                    "C".to_string(),
                    "D".to_string(),
                ]),
                correct_answer: "A".to_string(),
                explanation: format!("Option A restates a key idea of {}.", context.topic),
                difficulty: context.difficulty,
                concept: context.key_concepts.first().cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn grade_answer(&self, question: &Question, answer: &str) -> Result<AnswerFeedback> {
        Ok(question.local_feedback(answer))
    }
}
