//! The bot's dialogs and the routing table that starts them.
//!
//! | Dialog | Started by |
//! |--------|------------|
//! | `DeleteUserData` | `reset...` (interrupts any active dialog) |
//! | `Compliment` | `thanks`, `ok`, `okay` |
//! | `Playback` | `play`, `pause`, `next`, ... and intent `PlaybackControl` |
//! | `SelectDevice` | `devices`, `show devices`, `list devices` |
//! | `Greeting` | intent `Greeting` |
//! | `SongQuery` | intent `SongQuery` |
//! | `PlaylistControl` | intent `PlaylistControl` |
//! | `PlayMusic` | intent `PlayMusic` |
//! | `CreatePlaylist`, `SetupPlaylist` | `PlaylistControl` |
//! | `Authorize` | any dialog that needs a linked account |
//! | `AuthorizationCompleted` | the OAuth callback |

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialog::Dialog;
use crate::router::RoutingTable;

/// Get a music-service client or hand the turn to `Authorize`.
macro_rules! spotify_or_authorize {
    ($ctx:expr) => {
        spotify_or_authorize!($ctx, None)
    };
    ($ctx:expr, $message:expr) => {
        match $ctx.spotify_or_authorize($message) {
            Ok(client) => client,
            Err(outcome) => return Ok(outcome),
        }
    };
}

mod authorize;
mod devices;
mod greeting;
mod music;
mod playback;
mod playlist;
mod reset;

pub use authorize::{AuthorizationCompleted, Authorize};
pub use devices::SelectDevice;
pub use greeting::{Compliment, Greeting};
pub use music::{PlayMusic, SongQuery};
pub use playback::Playback;
pub use playlist::{CreatePlaylist, PlaylistControl, SetupPlaylist};
pub use reset::DeleteUserData;

pub const GREETING: &str = "Greeting";
pub const COMPLIMENT: &str = "Compliment";
pub const PLAYBACK: &str = "Playback";
pub const PLAY_MUSIC: &str = "PlayMusic";
pub const SONG_QUERY: &str = "SongQuery";
pub const SELECT_DEVICE: &str = "SelectDevice";
pub const PLAYLIST_CONTROL: &str = "PlaylistControl";
pub const CREATE_PLAYLIST: &str = "CreatePlaylist";
pub const SETUP_PLAYLIST: &str = "SetupPlaylist";
pub const AUTHORIZATION_COMPLETED: &str = "AuthorizationCompleted";
pub const DELETE_USER_DATA: &str = "DeleteUserData";
pub use crate::dialog::AUTHORIZE;

/// The dialog to start once an account is linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeTarget {
    pub dialog: String,
    #[serde(default)]
    pub args: Value,
}

/// Every dialog the bot knows.
pub fn catalogue() -> Result<Vec<Arc<dyn Dialog>>, regex::Error> {
    Ok(vec![
        Arc::new(Greeting),
        Arc::new(Compliment),
        Arc::new(Playback),
        Arc::new(PlayMusic),
        Arc::new(SongQuery),
        Arc::new(SelectDevice),
        Arc::new(PlaylistControl),
        Arc::new(CreatePlaylist),
        Arc::new(SetupPlaylist::new()?),
        Arc::new(Authorize::new()?),
        Arc::new(AuthorizationCompleted),
        Arc::new(DeleteUserData),
    ])
}

/// The routing table, in priority order.
pub fn routes() -> Result<RoutingTable, regex::Error> {
    Ok(RoutingTable::builder()
        .interrupting_pattern(r"^reset", DELETE_USER_DATA)?
        .pattern(r"^(thanks|ok|okay)\b", COMPLIMENT)?
        .pattern(
            r"^(play|pause|resume|stop|next|skip|previous|back)$",
            PLAYBACK,
        )?
        .pattern(r"^(?:(?:show|list) )?devices$", SELECT_DEVICE)?
        .intent("Greeting", GREETING)
        .intent("SongQuery", SONG_QUERY)
        .intent("PlaylistControl", PLAYLIST_CONTROL)
        .intent("PlaybackControl", PLAYBACK)
        .intent("PlayMusic", PLAY_MUSIC)
        .build())
}

/// Pattern that cancels a suspended sub-dialog.
fn cancel_pattern() -> Result<Regex, regex::Error> {
    RegexBuilder::new(r"^(cancel|nvm|never mind)$")
        .case_insensitive(true)
        .build()
}
