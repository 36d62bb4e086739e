//! Exam definitions: questions, limits and duration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Remaining time below which the presentation should warn the student.
pub const LOW_TIME_WARNING: Duration = Duration::from_secs(300);

/// A single exam question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    /// Question text shown to the student
    pub prompt: String,
    /// Maximum answer length in characters
    pub max_length: usize,
}

impl Question {
    pub fn new(id: u32, prompt: impl Into<String>, max_length: usize) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            max_length,
        }
    }

    /// Whether `answer` fits within this question's limit.
    pub fn accepts(&self, answer: &str) -> bool {
        answer.chars().count() <= self.max_length
    }
}

/// A timed exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub id: String,
    pub title: String,
    /// Time allowed, stored as seconds
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Questions in display order
    pub questions: Vec<Question>,
}

impl ExamDefinition {
    /// Look up a question by id.
    pub fn question(&self, id: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Load an exam from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ExamError> {
        let content = std::fs::read_to_string(path)?;
        let exam: ExamDefinition = serde_json::from_str(&content)?;
        exam.validate()?;
        Ok(exam)
    }

    /// Reject exams with no questions or duplicate question ids.
    pub fn validate(&self) -> Result<(), ExamError> {
        if self.questions.is_empty() {
            return Err(ExamError::Invalid("exam has no questions".to_string()));
        }
        let mut ids: Vec<u32> = self.questions.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ExamError::Invalid("duplicate question id".to_string()));
        }
        Ok(())
    }

    /// The built-in one-hour Computer Science exam.
    pub fn sample() -> Self {
        Self {
            id: "cs-101".to_string(),
            title: "Computer Science Exam".to_string(),
            duration: Duration::from_secs(3600),
            questions: vec![
                Question::new(
                    1,
                    "Explain the concept of object-oriented programming and its main principles.",
                    500,
                ),
                Question::new(
                    2,
                    "Describe the differences between procedural and functional programming paradigms.",
                    400,
                ),
                Question::new(
                    3,
                    "What are the advantages and disadvantages of using cloud computing for enterprise applications?",
                    600,
                ),
            ],
        }
    }
}

/// Errors loading an exam definition.
#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    #[error("failed to read exam: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse exam: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid exam: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
