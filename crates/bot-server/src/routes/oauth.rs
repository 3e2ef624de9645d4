//! OAuth redirect target.
//!
//! Spotify sends the user here after they approve (or deny) access. The
//! `state` parameter is the [`AuthState`] the bot put in the link; it names
//! the conversation to continue and the dialog to resume.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use orchestrator::dialogs::AUTHORIZATION_COMPLETED;
use orchestrator::AuthState;
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::AppState;

const THANKS_PAGE: &str = "<p>thanks, just close this window <3</p>";
const FAILURE_PAGE: &str = "<p>cannot authorize bot :(</p>";

/// Query parameters of the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizedParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user denied access.
    pub error: Option<String>,
}

fn failure() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Html(FAILURE_PAGE)).into_response()
}

/// Complete the authorization in the conversation named by `state`.
pub async fn authorized(
    State(app): State<AppState>,
    Query(params): Query<AuthorizedParams>,
) -> Response {
    if let Some(error) = &params.error {
        warn!("Authorization denied: {}", error);
        return failure();
    }
    let (Some(code), Some(raw_state)) = (params.code.as_deref(), params.state.as_deref()) else {
        warn!("Authorization redirect without code or state");
        return failure();
    };

    let state = match AuthState::decode(raw_state) {
        Ok(state) => state,
        Err(e) => {
            warn!("Unreadable authorization state: {}", e);
            return failure();
        }
    };

    info!(address = %state.address, "Authorization redirect received");
    match app
        .orchestrator
        .begin_dialog(
            &state.address,
            &state.user,
            AUTHORIZATION_COMPLETED,
            state.completion_args(code),
        )
        .await
    {
        Ok(_) => Html(THANKS_PAGE).into_response(),
        Err(e) => {
            warn!(address = %state.address, "Could not complete authorization: {}", e);
            failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::app_state;
    use axum::body::to_bytes;
    use bot_core::{Address, ChatUser};
    use serde_json::json;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn encoded_state(resume_dialog: Option<&str>) -> String {
        AuthState {
            address: Address::new("webchat", "conv-9"),
            user: ChatUser::named("u9", "Bob"),
            resume_dialog: resume_dialog.map(str::to_string),
            resume_args: json!({}),
        }
        .encode()
        .unwrap()
    }

    #[tokio::test]
    async fn test_callback_links_account() {
        let app = app_state();
        let params = AuthorizedParams {
            code: Some("code-1".to_string()),
            state: Some(encoded_state(None)),
            error: None,
        };

        let response = authorized(State(app.clone()), Query(params)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, THANKS_PAGE);

        let user = app.orchestrator.store().load_user("webchat:u9").await.unwrap();
        assert!(user.is_linked());
    }

    #[tokio::test]
    async fn test_missing_code() {
        let params = AuthorizedParams {
            state: Some(encoded_state(None)),
            ..Default::default()
        };
        let response = authorized(State(app_state()), Query(params)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, FAILURE_PAGE);
    }

    #[tokio::test]
    async fn test_denied_access() {
        let params = AuthorizedParams {
            error: Some("access_denied".to_string()),
            state: Some(encoded_state(Some("PlayMusic"))),
            ..Default::default()
        };
        let response = authorized(State(app_state()), Query(params)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_garbled_state() {
        let params = AuthorizedParams {
            code: Some("code-1".to_string()),
            state: Some("not base64 at all!".to_string()),
            error: None,
        };
        let response = authorized(State(app_state()), Query(params)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
