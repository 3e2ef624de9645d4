//! Intent recognizers for the Spotify chat bot.
//!
//! - [`LuisRecognizer`] - Calls a hosted LUIS (v2) endpoint
//! - [`RuleRecognizer`] - Matches regular-expression rules locally; named
//!   capture groups become entities
//!
//! Both implement [`bot_core::Recognizer`].
//!
//! # Example
//!
//! ```rust
//! use recognizer::RuleRecognizer;
//! use bot_core::Recognizer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recognizer = RuleRecognizer::builder()
//!     .rule("PlayMusic", r"^play (?P<songtitle>.+)$")?
//!     .build();
//!
//! let result = recognizer.recognize("play halo").await?.unwrap();
//! assert_eq!(result.intent, "PlayMusic");
//! assert_eq!(result.entity_value("songtitle"), Some("halo"));
//! # Ok(())
//! # }
//! ```

mod luis;
mod rules;

pub use luis::{LuisConfig, LuisRecognizer};
pub use rules::{Rule, RuleRecognizer, RuleRecognizerBuilder};

pub use bot_core::{IntentResult, Recognizer, RecognizerError};
