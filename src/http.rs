use crate::commands::{parse_command, CommandHandler, Reply};
use crate::fetcher::StatusSource;
use crate::notifier::Notifier;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub struct HttpState<S, N> {
    pub commands: CommandHandler<S, N>,
    pub group_id: i64,
    pub bot_name: Arc<str>,
    pub secret: Option<Arc<str>>,
}

impl<S, N> Clone for HttpState<S, N> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            group_id: self.group_id,
            bot_name: self.bot_name.clone(),
            secret: self.secret.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    update_id: Option<i64>,
    #[serde(default)]
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

async fn healthz() -> &'static str {
    "ok"
}

fn secret_matches(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected)
}

async fn post_update<S: StatusSource, N: Notifier>(
    State(state): State<HttpState<S, N>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !secret_matches(&headers, state.secret.as_deref()) {
        tracing::warn!("webhook call with missing or wrong secret token");
        return StatusCode::UNAUTHORIZED;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring undecodable update");
            return StatusCode::OK;
        }
    };
    let Some(message) = update.message else {
        return StatusCode::OK;
    };
    let Some(command) = message
        .text
        .as_deref()
        .and_then(|text| parse_command(text, &state.bot_name))
    else {
        return StatusCode::OK;
    };
    if message.chat.id != state.group_id {
        tracing::info!(chat_id = message.chat.id, update_id = ?update.update_id, "command from unauthorized chat ignored");
        return StatusCode::OK;
    }

    let reply = state.commands.handle(message.chat.id, command).await;
    let notifier = state.commands.monitor().notifier();
    let delivered = match reply {
        Reply::Text { text, rich } => notifier.send(&text, rich).await,
        Reply::Image(image) => notifier.send_image(image).await,
    };
    if let Err(err) = delivered {
        tracing::warn!(error = %err, ?command, "command reply delivery failed");
    }
    StatusCode::OK
}

pub fn router<S: StatusSource, N: Notifier>(state: HttpState<S, N>, webhook_path: &str) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(webhook_path, post(post_update::<S, N>))
        .with_state(state)
}
