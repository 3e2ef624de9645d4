//! Transport commands: parameter parsing and next-state rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Spotify repeat mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    #[default]
    Off,
    Track,
    Context,
}

impl RepeatState {
    /// Next state in the cycle off → track → context → off.
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Track,
            Self::Track => Self::Context,
            Self::Context => Self::Off,
        }
    }

    /// Query parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Track => "track",
            Self::Context => "context",
        }
    }
}

impl fmt::Display for RepeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On/off switch extracted from the user's words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
    /// No explicit switch; flip the current state.
    Flip,
}

impl Toggle {
    /// Resolve against the current boolean state.
    pub fn apply(self, current: bool) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Flip => !current,
        }
    }
}

/// Requested repeat change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// Advance to the next state in the cycle.
    Cycle,
    /// Switch repeat off.
    Off,
}

impl RepeatMode {
    /// Resolve against the current repeat state.
    pub fn apply(self, current: RepeatState) -> RepeatState {
        match self {
            Self::Cycle => current.next(),
            Self::Off => RepeatState::Off,
        }
    }
}

/// Where to seek to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    /// Absolute position in milliseconds.
    Position(u64),
    /// Percentage of the current track's duration.
    Percent(u8),
}

impl SeekTarget {
    /// Resolve to a position within a track of `duration_ms`.
    pub fn resolve(self, duration_ms: u64) -> u64 {
        match self {
            Self::Position(ms) => ms.min(duration_ms),
            Self::Percent(pct) => duration_ms * u64::from(pct) / 100,
        }
    }
}

/// A playback control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    Next,
    Previous,
    Seek(SeekTarget),
    Volume(u8),
    Shuffle(Toggle),
    Repeat(RepeatMode),
}

/// Raw parameters accompanying a command, as extracted from the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportArgs {
    /// A time such as "1:30".
    pub time: Option<String>,
    /// A number such as "50" or "50%".
    pub number: Option<String>,
    /// Explicit "on"/"off".
    pub switch: Option<String>,
}

/// Errors parsing a transport command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing or invalid position for seek")]
    InvalidSeek,

    #[error("missing or invalid volume")]
    InvalidVolume,
}

impl TransportCommand {
    /// Parse a command name plus its raw arguments.
    ///
    /// Synonyms: `resume` → play, `stop` → pause, `skip` → next, `back` → previous.
    pub fn parse(command: &str, args: &TransportArgs) -> Result<Self, TransportParseError> {
        let switch = args.switch.as_deref().map(str::to_lowercase);

        match command.trim().to_lowercase().as_str() {
            "play" | "resume" => Ok(Self::Play),
            "pause" | "stop" => Ok(Self::Pause),
            "next" | "skip" => Ok(Self::Next),
            "previous" | "prev" | "back" => Ok(Self::Previous),
            "seek" => {
                if let Some(ms) = args.time.as_deref().and_then(parse_timestamp) {
                    Ok(Self::Seek(SeekTarget::Position(ms)))
                } else if let Some(pct) = args.number.as_deref().and_then(parse_percent) {
                    Ok(Self::Seek(SeekTarget::Percent(pct)))
                } else {
                    Err(TransportParseError::InvalidSeek)
                }
            }
            "volume" => args
                .number
                .as_deref()
                .and_then(parse_percent)
                .map(Self::Volume)
                .ok_or(TransportParseError::InvalidVolume),
            "shuffle" => Ok(Self::Shuffle(match switch.as_deref() {
                Some("on") => Toggle::On,
                Some("off") => Toggle::Off,
                _ => Toggle::Flip,
            })),
            "repeat" => Ok(Self::Repeat(match switch.as_deref() {
                Some("off") => RepeatMode::Off,
                _ => RepeatMode::Cycle,
            })),
            other => Err(TransportParseError::UnknownCommand(other.to_string())),
        }
    }
}

/// Parse "ss", "mm:ss" or "h:mm:ss" into milliseconds.
pub fn parse_timestamp(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    for part in input.split(':') {
        let value: u64 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
    }
    total.checked_mul(1000)
}

/// Parse "50" or "50%" into a percentage clamped to 100.
pub fn parse_percent(input: &str) -> Option<u8> {
    let trimmed = input.trim().trim_end_matches('%').trim();
    let value: f64 = trimmed.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.min(100.0).round() as u8)
}

/// Format milliseconds as "m:ss".
pub fn format_position(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
