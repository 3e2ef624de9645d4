//! The Recognizer trait definition.

use async_trait::async_trait;

use crate::error::RecognizerError;
use crate::intent::IntentResult;

/// A trait for turning raw user text into an intent with entities.
///
/// Implementations range from a hosted language-understanding service to
/// simple regular-expression rules. This trait is object-safe and can be
/// used as `Arc<dyn Recognizer>`.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize the intent of `text`.
    ///
    /// Returns `Ok(None)` when no intent matched.
    async fn recognize(&self, text: &str) -> Result<Option<IntentResult>, RecognizerError>;

    /// Get a human-readable name for this recognizer.
    fn name(&self) -> &str;
}

/// A recognizer that never matches anything.
///
/// Useful when only text-pattern triggers are wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntentRecognizer;

#[async_trait]
impl Recognizer for NoIntentRecognizer {
    async fn recognize(&self, _text: &str) -> Result<Option<IntentResult>, RecognizerError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "NoIntentRecognizer"
    }
}
