use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::future::Future;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SNAPSHOT_FILE_NAME: &str = "snapshot.jpeg";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("transport request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("transport rejected {method}: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
}

/// Delivery channel for alerts, reports and command replies.
///
/// Callers treat both operations as fire-and-forget: a failure is logged and
/// never retried.
pub trait Notifier: Send + Sync + 'static {
    fn send(&self, text: &str, rich: bool) -> impl Future<Output = Result<(), NotifyError>> + Send;

    fn send_image(&self, image: Vec<u8>) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API transport bound to one destination chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: i64,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(client: Client, api_base: &str, token: &str, chat_id: i64) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call(&self, method: &'static str, payload: &JsonValue) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await?;
        check_response(method, response).await
    }

    /// Points the transport at our webhook listener.
    pub async fn register_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), NotifyError> {
        let mut payload = json!({ "url": url });
        if let Some(secret) = secret {
            payload["secret_token"] = JsonValue::String(secret.to_string());
        }
        self.call("setWebhook", &payload).await
    }

    pub async fn register_commands(&self) -> Result<(), NotifyError> {
        let payload = json!({
            "commands": [
                { "command": "start", "description": "Start monitoring" },
                { "command": "get_info", "description": "Show current sensor state" },
                { "command": "get_cam", "description": "Get a camera snapshot" },
            ]
        });
        self.call("setMyCommands", &payload).await
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, rich: bool) -> Result<(), NotifyError> {
        let mut payload = json!({ "chat_id": self.chat_id, "text": text });
        if rich {
            payload["parse_mode"] = JsonValue::String("HTML".to_string());
        }
        self.call("sendMessage", &payload).await
    }

    async fn send_image(&self, image: Vec<u8>) -> Result<(), NotifyError> {
        let photo = Part::bytes(image)
            .file_name(SNAPSHOT_FILE_NAME)
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("chat_id", self.chat_id.to_string())
            .part("photo", photo);
        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        check_response("sendPhoto", response).await
    }
}

async fn check_response(method: &'static str, response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    let body: Option<ApiResponse> = response.json().await.ok();
    match body {
        Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
        Some(ApiResponse { description, .. }) => Err(NotifyError::Api {
            method,
            description: description.unwrap_or_else(|| status.to_string()),
        }),
        None => Err(NotifyError::Api {
            method,
            description: format!("unreadable response ({status})"),
        }),
    }
}
