//! Message routing: an immutable table of triggers built once at startup.
//!
//! A trigger maps either a recognized intent name or a regular expression
//! over the raw text to a dialog. Triggers are consulted in registration
//! order and the first match wins. The recognizer is only called when the
//! first intent trigger is reached, and at most once per message.

use bot_core::{IntentResult, Recognizer, RecognizerError};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What a trigger matches on.
#[derive(Debug, Clone)]
pub enum TriggerMatcher {
    /// Exact intent name from the recognizer.
    Intent(String),
    /// Case-insensitive regex over the trimmed text.
    Pattern(Regex),
}

/// A route to a dialog.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub matcher: TriggerMatcher,
    pub dialog: &'static str,
    /// Whether the trigger fires even while another dialog is suspended,
    /// clearing the stack first.
    pub interrupts: bool,
}

/// Arguments handed to a dialog started by a trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerArgs {
    /// Recognizer result, for intent triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentResult>,
    /// Regex captures (index 0 is the whole match), for pattern triggers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched: Vec<String>,
    /// The raw message text.
    #[serde(default)]
    pub text: String,
}

impl TriggerArgs {
    /// Value of an intent entity.
    pub fn entity(&self, kind: &str) -> Option<&str> {
        self.intent.as_ref().and_then(|i| i.entity_value(kind))
    }

    /// The suffix of the first entity whose type starts with `prefix`,
    /// e.g. `seek` for `player_command::seek`.
    pub fn command(&self, prefix: &str) -> Option<&str> {
        self.intent
            .as_ref()
            .and_then(|i| i.find_entity_with_prefix(prefix))
            .map(|e| &e.kind[prefix.len()..])
    }

    /// A regex capture group, if it participated in the match.
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.matched
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// A trigger that matched.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub dialog: &'static str,
    pub args: TriggerArgs,
}

/// The ordered list of triggers.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    triggers: Vec<Trigger>,
}

impl RoutingTable {
    /// Start building a table.
    pub fn builder() -> RoutingTableBuilder {
        RoutingTableBuilder::default()
    }

    /// Registered triggers, in order.
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// The first interrupting pattern trigger matching `text`.
    pub fn interrupting(&self, text: &str) -> Option<RouteMatch> {
        let text = text.trim();
        self.triggers
            .iter()
            .filter(|t| t.interrupts)
            .find_map(|t| match &t.matcher {
                TriggerMatcher::Pattern(pattern) => pattern_match(t.dialog, pattern, text),
                TriggerMatcher::Intent(_) => None,
            })
    }

    /// Find the dialog to start for `text`.
    ///
    /// A recognizer failure does not stop later pattern triggers from
    /// matching; it is only reported when nothing matches at all.
    pub async fn route(
        &self,
        text: &str,
        recognizer: &dyn Recognizer,
    ) -> Result<Option<RouteMatch>, RecognizerError> {
        let text = text.trim();
        let mut recognized: Option<Option<IntentResult>> = None;
        let mut failure = None;

        for trigger in &self.triggers {
            match &trigger.matcher {
                TriggerMatcher::Pattern(pattern) => {
                    if let Some(found) = pattern_match(trigger.dialog, pattern, text) {
                        debug!("Pattern trigger matched {}", trigger.dialog);
                        return Ok(Some(found));
                    }
                }
                TriggerMatcher::Intent(name) => {
                    if recognized.is_none() {
                        let result = match recognizer.recognize(text).await {
                            Ok(result) => result,
                            Err(err) => {
                                warn!("Recognizer {} failed: {}", recognizer.name(), err);
                                failure = Some(err);
                                None
                            }
                        };
                        recognized = Some(result);
                    }

                    if let Some(Some(intent)) = &recognized {
                        if &intent.intent == name {
                            debug!("Intent trigger matched {}", trigger.dialog);
                            return Ok(Some(RouteMatch {
                                dialog: trigger.dialog,
                                args: TriggerArgs {
                                    intent: Some(intent.clone()),
                                    matched: Vec::new(),
                                    text: text.to_string(),
                                },
                            }));
                        }
                    }
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

fn pattern_match(dialog: &'static str, pattern: &Regex, text: &str) -> Option<RouteMatch> {
    let captures = pattern.captures(text)?;
    let matched = captures
        .iter()
        .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
        .collect();

    Some(RouteMatch {
        dialog,
        args: TriggerArgs {
            intent: None,
            matched,
            text: text.to_string(),
        },
    })
}

/// Builder for [`RoutingTable`].
#[derive(Debug, Default)]
pub struct RoutingTableBuilder {
    triggers: Vec<Trigger>,
}

impl RoutingTableBuilder {
    /// Route an intent name to a dialog.
    pub fn intent(mut self, intent: impl Into<String>, dialog: &'static str) -> Self {
        self.triggers.push(Trigger {
            matcher: TriggerMatcher::Intent(intent.into()),
            dialog,
            interrupts: false,
        });
        self
    }

    /// Route a text pattern to a dialog.
    pub fn pattern(self, pattern: &str, dialog: &'static str) -> Result<Self, regex::Error> {
        self.push_pattern(pattern, dialog, false)
    }

    /// Route a text pattern to a dialog, interrupting any active dialog.
    pub fn interrupting_pattern(
        self,
        pattern: &str,
        dialog: &'static str,
    ) -> Result<Self, regex::Error> {
        self.push_pattern(pattern, dialog, true)
    }

    fn push_pattern(
        mut self,
        pattern: &str,
        dialog: &'static str,
        interrupts: bool,
    ) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        self.triggers.push(Trigger {
            matcher: TriggerMatcher::Pattern(pattern),
            dialog,
            interrupts,
        });
        Ok(self)
    }

    /// Finish the table.
    pub fn build(self) -> RoutingTable {
        RoutingTable {
            triggers: self.triggers,
        }
    }
}
