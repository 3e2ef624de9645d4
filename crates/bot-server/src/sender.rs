//! Outbound delivery of replies.

use std::time::Duration;

use async_trait::async_trait;
use bot_core::{Address, Reply};
use orchestrator::{LoggingSender, MessageSender, OrchestratorError};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

/// Events posted to the connector webhook.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ConnectorEvent<'a> {
    Message { address: &'a Address, reply: &'a Reply },
    Typing { address: &'a Address, started: bool },
}

/// Posts replies and typing events as JSON to a bot connector webhook.
#[derive(Debug, Clone)]
pub struct ConnectorSender {
    client: Client,
    url: String,
}

impl ConnectorSender {
    pub fn new(url: impl Into<String>) -> Result<Self, OrchestratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OrchestratorError::Send(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, event: &ConnectorEvent<'_>) -> Result<(), OrchestratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| OrchestratorError::Send(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrchestratorError::Send(format!(
                "connector returned {}",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for ConnectorSender {
    async fn send(&self, address: &Address, reply: &Reply) -> Result<(), OrchestratorError> {
        debug!(address = %address, "Posting reply to connector");
        self.post(&ConnectorEvent::Message { address, reply }).await
    }

    async fn set_typing(&self, address: &Address, started: bool) -> Result<(), OrchestratorError> {
        self.post(&ConnectorEvent::Typing { address, started }).await
    }
}

/// The sender the server runs with.
#[derive(Debug, Clone)]
pub enum BotSender {
    Connector(ConnectorSender),
    Logging(LoggingSender),
}

impl BotSender {
    /// A connector sender when `url` is set, otherwise a logging one.
    pub fn from_url(url: Option<&str>) -> Result<Self, OrchestratorError> {
        Ok(match url {
            Some(url) => Self::Connector(ConnectorSender::new(url)?),
            None => Self::Logging(LoggingSender),
        })
    }
}

#[async_trait]
impl MessageSender for BotSender {
    async fn send(&self, address: &Address, reply: &Reply) -> Result<(), OrchestratorError> {
        match self {
            Self::Connector(sender) => sender.send(address, reply).await,
            Self::Logging(sender) => sender.send(address, reply).await,
        }
    }

    async fn set_typing(&self, address: &Address, started: bool) -> Result<(), OrchestratorError> {
        match self {
            Self::Connector(sender) => sender.set_typing(address, started).await,
            Self::Logging(sender) => sender.set_typing(address, started).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_layout() {
        let address = Address::new("slack", "C1");
        let reply = Reply::text("okay");

        let message = serde_json::to_value(ConnectorEvent::Message {
            address: &address,
            reply: &reply,
        })
        .unwrap();
        assert_eq!(
            message,
            json!({
                "type": "message",
                "address": { "channel": "slack", "conversation_id": "C1" },
                "reply": { "text": "okay" },
            })
        );

        let typing = serde_json::to_value(ConnectorEvent::Typing {
            address: &address,
            started: true,
        })
        .unwrap();
        assert_eq!(typing["type"], "typing");
        assert_eq!(typing["started"], true);
    }

    #[test]
    fn test_sender_selection() {
        assert!(matches!(BotSender::from_url(None), Ok(BotSender::Logging(_))));
        assert!(matches!(
            BotSender::from_url(Some("http://127.0.0.1:9/events")),
            Ok(BotSender::Connector(_))
        ));
    }
}
