//! The opaque OAuth `state` parameter.
//!
//! The authorization link carries the conversation address, the user, and
//! the dialog to resume once the account is linked, as base64 JSON. The
//! callback decodes it and starts `AuthorizationCompleted` in that
//! conversation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bot_core::{Address, ChatUser};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthStateError;

/// Closure data threaded through the OAuth redirect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub address: Address,
    pub user: ChatUser,
    /// Dialog to start after linking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_dialog: Option<String>,
    /// Arguments for the resumed dialog.
    #[serde(default)]
    pub resume_args: Value,
}

impl AuthState {
    /// Encode as transport-safe text.
    pub fn encode(&self) -> Result<String, AuthStateError> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    /// Decode a `state` parameter.
    pub fn decode(state: &str) -> Result<Self, AuthStateError> {
        let bytes = STANDARD.decode(state.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Arguments for `AuthorizationCompleted`.
    pub fn completion_args(&self, code: &str) -> Value {
        serde_json::json!({
            "code": code,
            "resume_dialog": self.resume_dialog,
            "resume_args": self.resume_args,
        })
    }
}
