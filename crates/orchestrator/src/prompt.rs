//! Prompts a dialog step can suspend on, and recognition of the user's answer.

use bot_core::Reply;
use serde::{Deserialize, Serialize};

/// How many times an unrecognized answer is re-prompted before the step
/// resumes with no answer.
pub const MAX_PROMPT_RETRIES: u8 = 2;

const YES_WORDS: &[&str] = &[
    "yes", "y", "yeah", "yea", "yep", "yup", "sure", "ok", "okay", "k", "of course", "please",
    "do it", "go ahead", "absolutely", "definitely",
];

const NO_WORDS: &[&str] = &[
    "no", "n", "nope", "nah", "not now", "no thanks", "never mind", "nvm", "don't", "dont",
];

/// What the bot is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prompt {
    /// Free text.
    Text { text: String },
    /// A yes/no question.
    Confirm { text: String },
    /// One of a fixed set of labels.
    Choice { text: String, choices: Vec<String> },
}

/// A recognized answer to a [`Prompt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    Text { value: String },
    Confirmed { value: bool },
    Choice { index: usize, label: String },
}

impl Answer {
    /// The answer as free text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { value } => Some(value),
            _ => None,
        }
    }

    /// Whether this is a "yes".
    pub fn is_yes(&self) -> bool {
        matches!(self, Self::Confirmed { value: true })
    }

    /// The chosen option, if this is a choice.
    pub fn choice(&self) -> Option<(usize, &str)> {
        match self {
            Self::Choice { index, label } => Some((*index, label)),
            _ => None,
        }
    }
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn confirm(text: impl Into<String>) -> Self {
        Self::Confirm { text: text.into() }
    }

    pub fn choice(text: impl Into<String>, choices: Vec<String>) -> Self {
        Self::Choice {
            text: text.into(),
            choices,
        }
    }

    /// Interpret the user's input. `None` means the input did not answer the
    /// prompt.
    pub fn recognize(&self, input: &str) -> Option<Answer> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        match self {
            Self::Text { .. } => Some(Answer::Text {
                value: input.to_string(),
            }),
            Self::Confirm { .. } => recognize_confirm(input).map(|value| Answer::Confirmed { value }),
            Self::Choice { choices, .. } => {
                recognize_choice(choices, input).map(|index| Answer::Choice {
                    index,
                    label: choices[index].clone(),
                })
            }
        }
    }

    /// The reply that asks the question.
    pub fn to_reply(&self) -> Reply {
        match self {
            Self::Text { text } => Reply::text(text),
            Self::Confirm { text } => {
                Reply::with_choices(text, vec!["yes".to_string(), "no".to_string()])
            }
            Self::Choice { text, choices } => Reply::with_choices(text, choices.clone()),
        }
    }

    /// The reply sent when an answer was not understood.
    pub fn retry_reply(&self) -> Reply {
        match self {
            Self::Text { text } => Reply::text(text),
            Self::Confirm { .. } => {
                Reply::with_choices("yes or no?", vec!["yes".to_string(), "no".to_string()])
            }
            Self::Choice { choices, .. } => {
                Reply::with_choices("please pick one of these :)", choices.clone())
            }
        }
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .trim_end_matches(['!', '.', '?', ' '])
        .to_lowercase()
}

fn recognize_confirm(input: &str) -> Option<bool> {
    let normalized = normalize(input);
    let first_word = normalized
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or_default();

    if YES_WORDS.contains(&normalized.as_str()) {
        Some(true)
    } else if NO_WORDS.contains(&normalized.as_str()) {
        Some(false)
    } else if YES_WORDS.contains(&first_word) {
        Some(true)
    } else if NO_WORDS.contains(&first_word) {
        Some(false)
    } else {
        None
    }
}

/// Match by 1-based number, exact label, or a substring unique to one label.
fn recognize_choice(choices: &[String], input: &str) -> Option<usize> {
    let normalized = normalize(input);

    if let Ok(n) = normalized.parse::<usize>() {
        return (1..=choices.len()).contains(&n).then(|| n - 1);
    }

    if let Some(index) = choices
        .iter()
        .position(|c| c.to_lowercase() == normalized)
    {
        return Some(index);
    }

    let mut candidates = choices
        .iter()
        .enumerate()
        .filter(|(_, c)| c.to_lowercase().contains(&normalized))
        .map(|(i, _)| i);
    match (candidates.next(), candidates.next()) {
        (Some(index), None) => Some(index),
        _ => None,
    }
}
