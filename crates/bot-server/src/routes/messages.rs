//! Bot connector webhook.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bot_core::{InboundKind, InboundMessage};
use orchestrator::TurnOutcome;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// What happened to a delivered message.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Receipt {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog: Option<String>,
}

impl From<TurnOutcome> for Receipt {
    fn from(outcome: TurnOutcome) -> Self {
        let (outcome, dialog) = match outcome {
            TurnOutcome::Continued => ("continued", None),
            TurnOutcome::Started(name) => ("started", Some(name)),
            TurnOutcome::Cancelled(name) => ("cancelled", Some(name)),
            TurnOutcome::Miss => ("miss", None),
            TurnOutcome::Failed => ("failed", None),
            TurnOutcome::Reauthorize => ("reauthorize", None),
            TurnOutcome::Acknowledged => ("acknowledged", None),
        };
        Self { outcome, dialog }
    }
}

/// Run one turn for an inbound message or connector event. Replies go out
/// through the sender.
pub async fn receive(
    State(state): State<AppState>,
    Json(message): Json<InboundMessage>,
) -> Result<(StatusCode, Json<Receipt>)> {
    if message.address.channel.is_empty() || message.address.conversation_id.is_empty() {
        return Err(ServerError::BadRequest(
            "message has no conversation address".to_string(),
        ));
    }

    if message.kind == InboundKind::Message && message.text.trim().is_empty() {
        debug!(address = %message.address, "Ignoring message without text");
        let receipt = Receipt {
            outcome: "ignored",
            dialog: None,
        };
        return Ok((StatusCode::ACCEPTED, Json(receipt)));
    }

    let outcome = state.orchestrator.process(message).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::app_state;
    use bot_core::{Address, ChatUser};

    fn message(text: &str) -> InboundMessage {
        InboundMessage::new(
            Address::new("webchat", "conv-1"),
            ChatUser::named("u1", "Alice"),
            text,
            0,
        )
    }

    #[tokio::test]
    async fn test_greeting_is_routed() {
        let state = app_state();
        let (status, Json(receipt)) = receive(State(state), Json(message("hello")))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(receipt.outcome, "started");
        assert_eq!(receipt.dialog.as_deref(), Some("Greeting"));
    }

    #[tokio::test]
    async fn test_prompt_suspends_dialog() {
        let state = app_state();
        let (_, Json(receipt)) = receive(State(state.clone()), Json(message("devices")))
            .await
            .unwrap();
        assert_eq!(receipt.dialog.as_deref(), Some("SelectDevice"));

        let record = state
            .orchestrator
            .store()
            .load_conversation(&Address::new("webchat", "conv-1"))
            .await
            .unwrap();
        assert_eq!(record.top().unwrap().name, "Authorize");
    }

    #[tokio::test]
    async fn test_blank_text_is_ignored() {
        let (status, Json(receipt)) = receive(State(app_state()), Json(message("   ")))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(receipt.outcome, "ignored");
    }

    #[tokio::test]
    async fn test_connector_events() {
        let state = app_state();
        let event = |kind| {
            InboundMessage::event(
                Address::new("webchat", "conv-1"),
                ChatUser::named("u1", "Alice"),
                kind,
                0,
            )
        };

        let (status, Json(receipt)) =
            receive(State(state.clone()), Json(event(InboundKind::BotAdded)))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(receipt.outcome, "acknowledged");

        let (_, Json(receipt)) =
            receive(State(state.clone()), Json(event(InboundKind::ContactRemoved)))
                .await
                .unwrap();
        assert_eq!(receipt.outcome, "started");
        assert_eq!(receipt.dialog.as_deref(), Some("DeleteUserData"));

        let (_, Json(receipt)) = receive(State(state), Json(event(InboundKind::DeleteUserData)))
            .await
            .unwrap();
        assert_eq!(receipt.dialog.as_deref(), Some("DeleteUserData"));
    }

    #[test]
    fn test_event_payload() {
        let message: InboundMessage = serde_json::from_value(serde_json::json!({
            "address": { "channel": "skype", "conversation_id": "c1" },
            "user": { "id": "u1", "name": "Alice" },
            "kind": "delete_user_data"
        }))
        .unwrap();
        assert_eq!(message.kind, InboundKind::DeleteUserData);
    }

    #[tokio::test]
    async fn test_missing_address_is_rejected() {
        let mut msg = message("hi");
        msg.address.conversation_id.clear();
        let result = receive(State(app_state()), Json(msg)).await;
        assert!(matches!(result, Err(ServerError::BadRequest(_))));
    }
}
