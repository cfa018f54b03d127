//! Quiz Engine
//! ===========
//!
//! Multiple-choice questions with immediate, one-shot feedback.
//!
//! Each question is independent and terminal: the first answer is committed
//! and every later click on that question is ignored. No score is kept
//! across questions.

use crate::error::ContentError;
use crate::widget::{Action, Block, Control, Frame, Tone, Widget, WidgetKind};
use semlab_env::MountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Rejected calls to [`QuizState::answer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("Question {0} is already answered")]
    AlreadyAnswered(usize),

    #[error("No question {0}")]
    QuestionOutOfRange(usize),

    #[error("Question {question} has no option {option}")]
    OptionOutOfRange { question: usize, option: usize },
}

/// A multiple-choice question. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: usize,
    /// Explanation per option index; every option must have one
    pub explanations: BTreeMap<usize, String>,
}

impl QuizQuestion {
    /// Builds and validates a question.
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: usize,
        explanations: BTreeMap<usize, String>,
    ) -> Result<Self, ContentError> {
        let question = Self {
            prompt: prompt.into(),
            options,
            correct,
            explanations,
        };
        question.validate()?;
        Ok(question)
    }

    /// Checks option count, uniqueness, correct index and explanation
    /// completeness.
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.options.len() < 2 {
            return Err(ContentError::TooFewOptions {
                question: self.prompt.clone(),
                count: self.options.len(),
            });
        }
        for (i, option) in self.options.iter().enumerate() {
            if self.options[..i].contains(option) {
                return Err(ContentError::DuplicateOption {
                    question: self.prompt.clone(),
                    option: option.clone(),
                });
            }
        }
        if self.correct >= self.options.len() {
            return Err(ContentError::CorrectOutOfRange {
                question: self.prompt.clone(),
                index: self.correct,
            });
        }
        if let Some(index) = (0..self.options.len()).find(|i| !self.explanations.contains_key(i)) {
            return Err(ContentError::MissingExplanation {
                question: self.prompt.clone(),
                index,
            });
        }
        Ok(())
    }

    pub fn explanation(&self, option: usize) -> Option<&str> {
        self.explanations.get(&option).map(String::as_str)
    }
}

/// A named list of questions bound to one quiz container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSet {
    pub key: String,
    pub questions: Vec<QuizQuestion>,
}

impl QuizSet {
    pub fn new(key: impl Into<String>, questions: Vec<QuizQuestion>) -> Result<Self, ContentError> {
        for q in &questions {
            q.validate()?;
        }
        Ok(Self {
            key: key.into(),
            questions,
        })
    }

    /// Parses a `{ "<key>": [questions...] }` map into validated sets,
    /// ordered by key.
    pub fn parse_catalog(json: &str) -> Result<Vec<QuizSet>, ContentError> {
        let raw: BTreeMap<String, Vec<QuizQuestion>> = serde_json::from_str(json)?;
        raw.into_iter()
            .map(|(key, questions)| QuizSet::new(key, questions))
            .collect()
    }

    /// Region label, e.g. "Quiz: model fit".
    pub fn aria_label(&self) -> String {
        format!("Quiz: {}", self.key.replace('-', " "))
    }
}

/// How one option button is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMark {
    Unmarked,
    Correct,
    Incorrect,
}

/// Result of a committed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback<'a> {
    pub correct: bool,
    pub text: &'a str,
}

/// Committed answers of one quiz set.
#[derive(Debug, Clone)]
pub struct QuizState {
    set: QuizSet,
    answers: Vec<Option<usize>>,
}

impl QuizState {
    pub fn new(set: QuizSet) -> Self {
        let answers = vec![None; set.questions.len()];
        Self { set, answers }
    }

    pub fn set(&self) -> &QuizSet {
        &self.set
    }

    /// Commits `option` for `question`. Commit-once: later calls fail.
    pub fn answer(&mut self, question: usize, option: usize) -> Result<Feedback<'_>, QuizError> {
        let q = self
            .set
            .questions
            .get(question)
            .ok_or(QuizError::QuestionOutOfRange(question))?;
        if option >= q.options.len() {
            return Err(QuizError::OptionOutOfRange { question, option });
        }
        if self.answers[question].is_some() {
            return Err(QuizError::AlreadyAnswered(question));
        }

        self.answers[question] = Some(option);
        Ok(Feedback {
            correct: option == q.correct,
            text: q.explanation(option).unwrap_or_default(),
        })
    }

    pub fn committed(&self, question: usize) -> Option<usize> {
        self.answers.get(question).copied().flatten()
    }

    /// Mark for one option: the chosen one is graded, and the correct one is
    /// always revealed once anything is committed.
    pub fn mark(&self, question: usize, option: usize) -> OptionMark {
        let (Some(chosen), Some(q)) = (self.committed(question), self.set.questions.get(question)) else {
            return OptionMark::Unmarked;
        };
        if option == q.correct {
            OptionMark::Correct
        } else if option == chosen {
            OptionMark::Incorrect
        } else {
            OptionMark::Unmarked
        }
    }

    pub fn feedback(&self, question: usize) -> Option<Feedback<'_>> {
        let chosen = self.committed(question)?;
        let q = self.set.questions.get(question)?;
        Some(Feedback {
            correct: chosen == q.correct,
            text: q.explanation(chosen).unwrap_or_default(),
        })
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }
}

/// One quiz container.
pub struct QuizWidget {
    mount: MountId,
    state: QuizState,
}

impl QuizWidget {
    pub fn new(mount: MountId, set: QuizSet) -> Self {
        Self {
            mount,
            state: QuizState::new(set),
        }
    }

    pub fn state(&self) -> &QuizState {
        &self.state
    }
}

impl Widget for QuizWidget {
    fn mount(&self) -> &MountId {
        &self.mount
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::Quiz
    }

    fn render(&self) -> Frame {
        let set = self.state.set();
        let mut frame = Frame {
            aria_label: Some(set.aria_label()),
            ..Frame::default()
        };

        for (qi, q) in set.questions.iter().enumerate() {
            let locked = self.state.committed(qi).is_some();
            let mut block = Block::new("quiz-question").labelled(format!("{}-q{}", self.mount.as_str(), qi));
            block.push(Control::text("quiz-prompt", format!("{}. {}", qi + 1, q.prompt)));

            for (oi, option) in q.options.iter().enumerate() {
                let tone = match self.state.mark(qi, oi) {
                    OptionMark::Unmarked => Tone::Neutral,
                    OptionMark::Correct => Tone::Correct,
                    OptionMark::Incorrect => Tone::Incorrect,
                };
                let mut button = Control::button(
                    option.clone(),
                    option.clone(),
                    Action::Answer { question: qi, option: oi },
                )
                .toned(tone);
                if locked {
                    button = button.disabled();
                }
                block.push(button);
            }

            if let Some(feedback) = self.state.feedback(qi) {
                let tone = if feedback.correct { Tone::Correct } else { Tone::Incorrect };
                block.push(Control::text("quiz-feedback", feedback.text).toned(tone));
            }
            frame.push(block);
        }

        frame
    }

    fn dispatch(&mut self, action: &Action) -> bool {
        let Action::Answer { question, option } = action else {
            return false;
        };
        match self.state.answer(*question, *option) {
            Ok(feedback) => {
                debug!("{} q{} answered {} (correct={})", self.mount, question, option, feedback.correct);
                true
            }
            Err(e) => {
                debug!("{} ignored answer: {}", self.mount, e);
                false
            }
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
