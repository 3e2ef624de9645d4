//! Intent recognition results.

use serde::{Deserialize, Serialize};

/// Character span of an entity inside the recognized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
}

/// An entity extracted from the user's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type, e.g. `songtitle` or `player_command::seek`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The matched text.
    pub value: String,
    /// Where the entity was found, if the recognizer reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<EntitySpan>,
}

impl Entity {
    /// Create an entity without span information.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            span: None,
        }
    }

    /// Attach a span to this entity.
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some(EntitySpan { start, end });
        self
    }
}

/// The result of running a recognizer over a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    /// Name of the top scoring intent.
    pub intent: String,
    /// Confidence reported by the recognizer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Extracted entities in the order the recognizer reported them.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl IntentResult {
    /// Create an intent result with no entities.
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            score: None,
            entities: Vec::new(),
        }
    }

    /// Builder-style helper to add an entity.
    pub fn with_entity(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities.push(Entity::new(kind, value));
        self
    }

    /// Find the first entity of the given type.
    pub fn find_entity(&self, kind: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.kind == kind)
    }

    /// Value of the first entity of the given type.
    pub fn entity_value(&self, kind: &str) -> Option<&str> {
        self.find_entity(kind).map(|e| e.value.as_str())
    }

    /// Find the first entity whose type starts with `prefix`.
    ///
    /// Used for hierarchical entities such as `player_command::seek`.
    pub fn find_entity_with_prefix(&self, prefix: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.kind.starts_with(prefix))
    }
}
