//! Reply texts and track cards.

use bot_core::{ChatUser, TrackCard};
use spotify_client::Track;

/// Sent when nothing matched the message.
pub const HELP_TEXT: &str = "not sure what you mean :/ try things like:\n\
- **play** shape of you\n\
- **pause**, **next**, **repeat**, **volume** 50\n\
- **what's playing**\n\
- **devices**\n\
- **create playlist**, **add this to playlist**\n\
- **reset** to forget everything about you";

/// Sent when a step fails and the turn is rolled back.
pub const APOLOGY_TEXT: &str = "oops, something went wrong. please try again :(";

/// Sent when a player command finds no active device.
pub const NO_DEVICE_TEXT: &str = "no active spotify device. say 'devices' to pick one";

/// Confirmation question when a previously linked account stopped working.
pub const RELINK_TEXT: &str =
    "looks like I lost access to your spotify account. want to link it again?";

/// Sent when the bot joins a group conversation.
pub const BOT_ADDED_TEXT: &str = "hello everyone!";

/// Sent when the bot is removed from a group conversation.
pub const BOT_REMOVED_TEXT: &str = "k bye";

/// A card describing `track`.
pub fn track_card(track: &Track) -> TrackCard {
    // Medium-size cover when several sizes are offered.
    let images = &track.album.images;
    let image = images.get(1).or_else(|| images.first());

    TrackCard {
        title: track.display_name(),
        subtitle: track.album.name.clone(),
        image_url: image.map(|i| i.url.clone()),
        open_url: track.external_urls.spotify.clone(),
    }
}

/// "hey, alice :)".
pub fn greeting(word: Option<&str>, user: &ChatUser) -> String {
    let name = user
        .name
        .as_deref()
        .map(str::to_lowercase)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "user".to_string());
    format!("{}, {} :)", word.unwrap_or("hey"), name)
}

/// "hello alice..." when someone adds the bot as a contact.
pub fn contact_greeting(user: &ChatUser) -> String {
    let name = user.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("there");
    format!("hello {}...", name)
}
