//! Content validation errors.

use thiserror::Error;

/// Errors raised while building or loading lecture content.
///
/// These only occur at construction time; a widget built from valid
/// content never produces one.
#[derive(Debug, Error)]
pub enum ContentError {
    /// A quiz question has fewer than two options
    #[error("Question {question:?} needs at least 2 options, got {count}")]
    TooFewOptions { question: String, count: usize },

    /// Two options of one question share a label
    #[error("Question {question:?} has duplicate option {option:?}")]
    DuplicateOption { question: String, option: String },

    /// The correct index does not name an option
    #[error("Question {question:?}: correct index {index} out of range")]
    CorrectOutOfRange { question: String, index: usize },

    /// An option has no explanation text
    #[error("Question {question:?}: option {index} has no explanation")]
    MissingExplanation { question: String, index: usize },

    /// A decision tree node is malformed
    #[error("Invalid decision tree: {0}")]
    InvalidTree(String),

    /// A simulation input has an unusable range or step
    #[error("Invalid input {name:?}: {reason}")]
    InvalidInput { name: String, reason: String },

    /// Content JSON failed to parse
    #[error("Content parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ContentError {
    /// Creates a tree error.
    pub fn tree(msg: impl Into<String>) -> Self {
        Self::InvalidTree(msg.into())
    }

    /// Creates an input error.
    pub fn input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
