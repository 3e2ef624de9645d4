//! Local recognizer driven by regular-expression rules.

use bot_core::{async_trait, Entity, IntentResult, Recognizer, RecognizerError};
use regex::{Regex, RegexBuilder};
use tracing::trace;

/// A single recognition rule.
///
/// Named capture groups in `pattern` become entities of the same type.
/// `entities` are attached verbatim whenever the rule matches.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Intent produced when the rule matches.
    pub intent: String,
    /// Case-insensitive pattern matched against the trimmed text.
    pub pattern: Regex,
    /// Fixed entities added on every match.
    pub entities: Vec<Entity>,
}

impl Rule {
    fn apply(&self, text: &str) -> Option<IntentResult> {
        let captures = self.pattern.captures(text)?;

        let mut result = IntentResult::new(&self.intent);
        result.score = Some(1.0);

        for name in self.pattern.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                let value = m.as_str().trim();
                if !value.is_empty() {
                    result
                        .entities
                        .push(Entity::new(name, value).with_span(m.start(), m.end()));
                }
            }
        }
        result.entities.extend(self.entities.iter().cloned());

        Some(result)
    }
}

/// A recognizer that evaluates rules in registration order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleRecognizer {
    rules: Vec<Rule>,
}

impl RuleRecognizer {
    /// Start building a rule set.
    pub fn builder() -> RuleRecognizerBuilder {
        RuleRecognizerBuilder::default()
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules covering the intents the Spotify dialogs understand.
    ///
    /// Used when no hosted model is configured.
    pub fn spotify_defaults() -> Result<Self, regex::Error> {
        Ok(Self::builder()
            .rule("Greeting", r"^(?P<greeting>hi|hello|hey|yo|sup)\b")?
            .rule("SongQuery", r"^(what'?s|what is) (playing|this song|this)\??$")?
            .rule(
                "PlaylistControl",
                r"^create (?:a |new |a new )?playlist(?: (?:called|named) (?P<playlist_name>.+))?$",
            )?
            .with_entity("playlist_command::create", "create")
            .rule("PlaylistControl", r"^(?:show|choose|pick|set) (?:my |a )?playlists?$")?
            .with_entity("playlist_command::show", "show")
            .rule(
                "PlaylistControl",
                r"^add (?:this|it|current)(?: song| track)? to (?:the |my )?playlist$",
            )?
            .with_entity("playlist_command::add", "add")
            .rule("PlaylistControl", r"^clear (?:the |my )?playlist$")?
            .with_entity("playlist_command::clear", "clear")
            .rule("PlaylistControl", r"^play (?:the |my )?playlist$")?
            .with_entity("playlist_command::play", "play")
            .rule("PlaybackControl", r"^seek (?:to )?(?P<time>\d{1,2}(?::\d{2}){1,2})$")?
            .with_entity("player_command::seek", "seek")
            .rule("PlaybackControl", r"^seek (?:to )?(?P<number>\d{1,3})\s*%$")?
            .with_entity("player_command::seek", "seek")
            .rule("PlaybackControl", r"^(?:set )?volume (?:to )?(?P<number>\d{1,3})\s*%?$")?
            .with_entity("player_command::volume", "volume")
            .rule("PlaybackControl", r"^shuffle(?: (?P<switch>on|off))?$")?
            .with_entity("player_command::shuffle", "shuffle")
            .rule("PlaybackControl", r"^repeat(?: (?P<switch>on|off))?$")?
            .with_entity("player_command::repeat", "repeat")
            .rule(
                "PlayMusic",
                r"^play (?P<songtitle>.+?)(?: by (?P<songartist>.+))?$",
            )?
            .build())
    }
}

#[async_trait]
impl Recognizer for RuleRecognizer {
    async fn recognize(&self, text: &str) -> Result<Option<IntentResult>, RecognizerError> {
        let text = text.trim();
        let result = self.rules.iter().find_map(|rule| rule.apply(text));
        trace!(matched = ?result.as_ref().map(|r| &r.intent), "Rule recognition for {:?}", text);
        Ok(result)
    }

    fn name(&self) -> &str {
        "RuleRecognizer"
    }
}

/// Builder for [`RuleRecognizer`].
#[derive(Debug, Default)]
pub struct RuleRecognizerBuilder {
    rules: Vec<Rule>,
}

impl RuleRecognizerBuilder {
    /// Add a rule. Patterns are compiled case-insensitively.
    pub fn rule(mut self, intent: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        self.rules.push(Rule {
            intent: intent.into(),
            pattern,
            entities: Vec::new(),
        });
        Ok(self)
    }

    /// Attach a fixed entity to the most recently added rule.
    pub fn with_entity(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(rule) = self.rules.last_mut() {
            rule.entities.push(Entity::new(kind, value));
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> RuleRecognizer {
        RuleRecognizer { rules: self.rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn recognize(text: &str) -> Option<IntentResult> {
        RuleRecognizer::spotify_defaults()
            .unwrap()
            .recognize(text)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_play_music_with_artist() {
        let result = recognize("Play Shape of You by Ed Sheeran").await.unwrap();
        assert_eq!(result.intent, "PlayMusic");
        assert_eq!(result.entity_value("songtitle"), Some("Shape of You"));
        assert_eq!(result.entity_value("songartist"), Some("Ed Sheeran"));
    }

    #[tokio::test]
    async fn test_play_music_title_only() {
        let result = recognize("play shape of you").await.unwrap();
        assert_eq!(result.intent, "PlayMusic");
        assert_eq!(result.entity_value("songtitle"), Some("shape of you"));
        assert!(result.find_entity("songartist").is_none());
    }

    #[tokio::test]
    async fn test_play_playlist_wins_over_play_music() {
        let result = recognize("play my playlist").await.unwrap();
        assert_eq!(result.intent, "PlaylistControl");
        assert!(result.find_entity("playlist_command::play").is_some());
    }

    #[tokio::test]
    async fn test_create_playlist_with_name() {
        let result = recognize("create playlist called road trip").await.unwrap();
        assert_eq!(result.intent, "PlaylistControl");
        assert_eq!(result.entity_value("playlist_name"), Some("road trip"));
        assert!(result.find_entity("playlist_command::create").is_some());
    }

    #[tokio::test]
    async fn test_seek_time_and_percent() {
        let result = recognize("seek to 1:30").await.unwrap();
        assert_eq!(result.entity_value("time"), Some("1:30"));

        let result = recognize("seek 50%").await.unwrap();
        assert_eq!(result.entity_value("number"), Some("50"));
    }

    #[tokio::test]
    async fn test_shuffle_switch() {
        let result = recognize("shuffle off").await.unwrap();
        assert_eq!(result.intent, "PlaybackControl");
        assert_eq!(result.entity_value("switch"), Some("off"));
        assert!(result.find_entity("player_command::shuffle").is_some());
    }

    #[tokio::test]
    async fn test_no_match() {
        assert!(recognize("what is the meaning of life").await.is_none());
    }
}
