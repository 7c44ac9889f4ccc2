use digest_auth::AuthContext;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("no camera configured for chat {0}")]
    NotConfigured(i64),
    #[error("camera request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("camera returned {0}")]
    Status(StatusCode),
    #[error("camera digest challenge rejected: {0}")]
    Digest(#[from] digest_auth::Error),
}

#[derive(Clone, Deserialize)]
pub struct CameraCredentials {
    pub chat_id: i64,
    pub nvr: String,
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for CameraCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCredentials")
            .field("chat_id", &self.chat_id)
            .field("nvr", &self.nvr)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// Camera recorder credentials keyed by chat.
///
/// A chat without its own entry falls back to the default chat's recorder
/// when one is configured.
#[derive(Debug, Clone, Default)]
pub struct CameraDirectory {
    entries: HashMap<i64, CameraCredentials>,
    default_chat_id: Option<i64>,
}

impl CameraDirectory {
    pub fn new(entries: Vec<CameraCredentials>, default_chat_id: Option<i64>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.chat_id, entry))
            .collect();
        Self {
            entries,
            default_chat_id,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, chat_id: i64) -> Result<&CameraCredentials, CameraError> {
        if let Some(entry) = self.entries.get(&chat_id) {
            return Ok(entry);
        }
        self.default_chat_id
            .and_then(|default| self.entries.get(&default))
            .ok_or(CameraError::NotConfigured(chat_id))
    }
}

#[derive(Debug, Clone)]
pub struct CameraClient {
    client: Client,
    directory: CameraDirectory,
    timeout: Duration,
    default_channel: u32,
}

impl CameraClient {
    pub fn new(
        client: Client,
        directory: CameraDirectory,
        timeout: Duration,
        default_channel: u32,
    ) -> Self {
        Self {
            client,
            directory,
            timeout,
            default_channel,
        }
    }

    pub fn snapshot_url(credentials: &CameraCredentials, channel: u32) -> String {
        let nvr = credentials.nvr.trim_end_matches('/');
        let base = if nvr.starts_with("http://") || nvr.starts_with("https://") {
            nvr.to_string()
        } else {
            format!("http://{nvr}")
        };
        format!("{base}/cgi-bin/snapshot.cgi?channel={channel}")
    }

    pub async fn snapshot(&self, chat_id: i64, channel: Option<u32>) -> Result<Vec<u8>, CameraError> {
        let credentials = self.directory.lookup(chat_id)?;
        let channel = channel.unwrap_or(self.default_channel);
        let url = Self::snapshot_url(credentials, channel);
        tracing::debug!(chat_id, channel, nvr = %credentials.nvr, "requesting camera snapshot");

        let mut response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .basic_auth(&credentials.login, Some(&credentials.password))
            .send()
            .await?;
        if let Some(challenge) = digest_challenge(&response) {
            let authorization = digest_authorization(&challenge, response.url(), credentials)?;
            tracing::debug!(chat_id, channel, "camera requested digest auth");
            response = self
                .client
                .get(&url)
                .timeout(self.timeout)
                .header(AUTHORIZATION, authorization)
                .send()
                .await?;
        }
        let status = response.status();
        if !status.is_success() {
            return Err(CameraError::Status(status));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn digest_challenge(response: &Response) -> Option<String> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return None;
    }
    response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| {
            value
                .trim_start()
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        })
        .map(str::to_string)
}

/// Answers a `WWW-Authenticate: Digest` challenge for a GET of `url`.
fn digest_authorization(
    challenge: &str,
    url: &Url,
    credentials: &CameraCredentials,
) -> Result<String, CameraError> {
    let uri = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };
    let mut prompt = digest_auth::parse(challenge)?;
    let context = AuthContext::new(
        credentials.login.as_str(),
        credentials.password.as_str(),
        uri,
    );
    Ok(prompt.respond(&context)?.to_header_string())
}
