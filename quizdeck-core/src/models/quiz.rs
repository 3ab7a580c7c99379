//! Quiz records.
//!
//! A quiz is one of three shapes, selected by its `type` field:
//!
//! - `MCQ`: multiple choice questions, each answer being one of its choices
//! - `TOFQ`: true or false questions
//! - `DNDQ`: drag and drop, where every answer is taken from a shared pool
//!
//! Records are checked when they are deserialized, so a `Quiz` value always
//! carries exactly the fields its type allows.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::status::QuizStatus;

/// Errors raised when a quiz record does not match its declared type.
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Unknown quiz type '{0}'. Valid options: MCQ, TOFQ, DNDQ")]
    UnknownType(String),

    #[error("{kind} quizzes cannot carry an answer pool")]
    UnexpectedAnswerPool { kind: &'static str },

    #[error("DNDQ quizzes require an answer pool")]
    MissingAnswerPool,

    #[error("Malformed {kind} quiz: {source}")]
    Shape {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Question {index} lists choice '{choice}' more than once")]
    DuplicateChoice { index: usize, choice: String },

    #[error("Question {index} answer '{answer}' is not one of its choices")]
    AnswerNotInChoices { index: usize, answer: String },

    #[error("Question {index} answer '{answer}' is not in the answer pool")]
    AnswerNotInPool { index: usize, answer: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultipleChoiceQuestion {
    pub question: String,
    pub choices: Vec<String>,
    pub answer: String,
}

impl MultipleChoiceQuestion {
    pub fn new(
        question: impl Into<String>,
        choices: impl IntoIterator<Item = impl Into<String>>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            choices: choices.into_iter().map(Into::into).collect(),
            answer: answer.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrueOrFalseQuestion {
    pub question: String,
    pub answer: bool,
}

impl TrueOrFalseQuestion {
    pub fn new(question: impl Into<String>, answer: bool) -> Self {
        Self {
            question: question.into(),
            answer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DragAndDropQuestion {
    pub question: String,
    pub answer: String,
}

impl DragAndDropQuestion {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Variant-specific part of a quiz, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum QuizKind {
    #[serde(rename = "MCQ")]
    MultipleChoice {
        questions: Vec<MultipleChoiceQuestion>,
    },
    #[serde(rename = "TOFQ")]
    TrueOrFalse { questions: Vec<TrueOrFalseQuestion> },
    #[serde(rename = "DNDQ")]
    DragAndDrop {
        /// The draggable pool every answer is taken from.
        answers: Vec<String>,
        questions: Vec<DragAndDropQuestion>,
    },
}

impl QuizKind {
    /// The `type` tag stored with the record.
    pub fn type_code(&self) -> &'static str {
        match self {
            QuizKind::MultipleChoice { .. } => "MCQ",
            QuizKind::TrueOrFalse { .. } => "TOFQ",
            QuizKind::DragAndDrop { .. } => "DNDQ",
        }
    }

    pub fn question_count(&self) -> usize {
        match self {
            QuizKind::MultipleChoice { questions } => questions.len(),
            QuizKind::TrueOrFalse { questions } => questions.len(),
            QuizKind::DragAndDrop { questions, .. } => questions.len(),
        }
    }
}

/// A quiz owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuiz")]
pub struct Quiz {
    pub quiz_id: String,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    pub title: String,
    pub description: String,
    pub status: QuizStatus,
    #[serde(flatten)]
    pub kind: QuizKind,
}

impl Quiz {
    pub fn new(created_by: impl Into<String>, title: impl Into<String>, kind: QuizKind) -> Self {
        Self {
            quiz_id: Uuid::new_v4().to_string(),
            created_at: Utc::now().timestamp_millis(),
            created_by: created_by.into(),
            title: title.into(),
            description: String::new(),
            status: QuizStatus::Live,
            kind,
        }
    }

    pub fn with_id(mut self, quiz_id: impl Into<String>) -> Self {
        self.quiz_id = quiz_id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn type_code(&self) -> &'static str {
        self.kind.type_code()
    }

    pub fn is_live(&self) -> bool {
        self.status == QuizStatus::Live
    }

    /// Checks that every answer is drawn from the options its question offers.
    pub fn validate(&self) -> Result<(), QuizError> {
        match &self.kind {
            QuizKind::MultipleChoice { questions } => {
                for (index, q) in questions.iter().enumerate() {
                    let mut seen = HashSet::with_capacity(q.choices.len());
                    for choice in &q.choices {
                        if !seen.insert(choice.as_str()) {
                            return Err(QuizError::DuplicateChoice {
                                index,
                                choice: choice.clone(),
                            });
                        }
                    }
                    if !seen.contains(q.answer.as_str()) {
                        return Err(QuizError::AnswerNotInChoices {
                            index,
                            answer: q.answer.clone(),
                        });
                    }
                }
            }
            QuizKind::TrueOrFalse { .. } => {}
            QuizKind::DragAndDrop { answers, questions } => {
                for (index, q) in questions.iter().enumerate() {
                    if !answers.contains(&q.answer) {
                        return Err(QuizError::AnswerNotInPool {
                            index,
                            answer: q.answer.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Wire shape accepted before the `type` tag has been checked.
#[derive(Deserialize)]
struct RawQuiz {
    quiz_id: String,
    #[serde(rename = "createdAt")]
    created_at: i64,
    #[serde(rename = "createdBy")]
    created_by: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: QuizStatus,
    #[serde(rename = "type")]
    kind: String,
    questions: serde_json::Value,
    #[serde(default)]
    answers: Option<serde_json::Value>,
}

fn decode<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    value: serde_json::Value,
) -> Result<T, QuizError> {
    serde_json::from_value(value).map_err(|source| QuizError::Shape { kind, source })
}

impl TryFrom<RawQuiz> for Quiz {
    type Error = QuizError;

    fn try_from(raw: RawQuiz) -> Result<Self, Self::Error> {
        let kind = match raw.kind.as_str() {
            "MCQ" => {
                if raw.answers.is_some() {
                    return Err(QuizError::UnexpectedAnswerPool { kind: "MCQ" });
                }
                QuizKind::MultipleChoice {
                    questions: decode("MCQ", raw.questions)?,
                }
            }
            "TOFQ" => {
                if raw.answers.is_some() {
                    return Err(QuizError::UnexpectedAnswerPool { kind: "TOFQ" });
                }
                QuizKind::TrueOrFalse {
                    questions: decode("TOFQ", raw.questions)?,
                }
            }
            "DNDQ" => {
                let answers = raw.answers.ok_or(QuizError::MissingAnswerPool)?;
                QuizKind::DragAndDrop {
                    answers: decode("DNDQ", answers)?,
                    questions: decode("DNDQ", raw.questions)?,
                }
            }
            other => return Err(QuizError::UnknownType(other.to_string())),
        };

        let quiz = Quiz {
            quiz_id: raw.quiz_id,
            created_at: raw.created_at,
            created_by: raw.created_by,
            title: raw.title,
            description: raw.description,
            status: raw.status,
            kind,
        };
        quiz.validate()?;
        Ok(quiz)
    }
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.chars().count()))?;
        writeln!(f, "ID: {}", self.quiz_id)?;
        writeln!(f, "Type: {}", self.type_code())?;
        writeln!(f, "Status: {}", self.status)?;

        if !self.description.is_empty() {
            writeln!(f, "\n{}", self.description)?;
        }

        writeln!(f, "\nQuestions:")?;
        match &self.kind {
            QuizKind::MultipleChoice { questions } => {
                for (i, q) in questions.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, q.question)?;
                    for choice in &q.choices {
                        let marker = if *choice == q.answer { "*" } else { " " };
                        writeln!(f, "     {} {}", marker, choice)?;
                    }
                }
            }
            QuizKind::TrueOrFalse { questions } => {
                for (i, q) in questions.iter().enumerate() {
                    writeln!(f, "  {}. {} ({})", i + 1, q.question, q.answer)?;
                }
            }
            QuizKind::DragAndDrop { answers, questions } => {
                writeln!(f, "  Pool: {}", answers.join(", "))?;
                for (i, q) in questions.iter().enumerate() {
                    writeln!(f, "  {}. {} -> {}", i + 1, q.question, q.answer)?;
                }
            }
        }

        Ok(())
    }
}
