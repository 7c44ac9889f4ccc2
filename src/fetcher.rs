use crate::status::RawDocument;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("status request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("status endpoint returned {0}")]
    Status(StatusCode),
    #[error("status document could not be decoded: {0}")]
    Decode(String),
}

/// Anything that can produce the device status document.
pub trait StatusSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<RawDocument, FetchError>> + Send;
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Fetches the status document over HTTP with Basic authentication.
///
/// One request per call and no retries; the polling cadence is the retry.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: Client,
    url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl HttpStatusSource {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            credentials,
            timeout,
        }
    }
}

impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<RawDocument, FetchError> {
        let mut request = self.client.get(&self.url).timeout(self.timeout);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(status = %status, "status endpoint responded");
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let mut body = response.bytes().await?.to_vec();
        decode_document(&mut body)
    }
}

pub fn decode_document(body: &mut [u8]) -> Result<RawDocument, FetchError> {
    let value: JsonValue =
        simd_json::serde::from_slice(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    match value {
        JsonValue::Object(fields) => Ok(RawDocument::new(fields)),
        _ => Err(FetchError::Decode(
            "expected a JSON object at the top level".to_string(),
        )),
    }
}
