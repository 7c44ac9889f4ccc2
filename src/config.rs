use crate::camera::{CameraCredentials, CameraDirectory};
use crate::fetcher::Credentials;
use crate::report::ReportTime;
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REPORT_TIMES: &str = "17:30";
const DEFAULT_OUTPUT_NAME: &str = "Ventilation";
const DEFAULT_TIMEZONE: &str = "Europe/Moscow";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

fn setup_config_path() -> Option<PathBuf> {
    env_optional("SENSE_SETUP_CONFIG_PATH").map(PathBuf::from)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SetupConfigOverrides {
    #[serde(default)]
    cameras: Vec<CameraCredentials>,
    #[serde(default)]
    default_camera_chat_id: Option<i64>,
    #[serde(default)]
    report_times: Option<Vec<String>>,
    #[serde(default)]
    output_name: Option<String>,
}

fn read_setup_config(path: &Path) -> Result<SetupConfigOverrides> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read setup config {}", path.display()))?;
    let mut bytes = contents.into_bytes();
    simd_json::serde::from_slice(&mut bytes)
        .with_context(|| format!("failed to parse setup config {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub group_id: i64,
    pub bot_name: String,
    pub telegram_api_url: String,

    pub status_url: String,
    pub status_credentials: Option<Credentials>,
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,

    pub report_times: Vec<ReportTime>,
    pub output_name: String,
    pub timezone: Tz,

    pub http_bind: String,
    pub webhook_host: Option<String>,
    pub webhook_path: String,
    pub webhook_secret: Option<String>,

    pub cameras: CameraDirectory,
    pub default_camera_channel: u32,

    pub otlp_endpoint: Option<String>,

    /// Why the setup file was ignored. Config loads before tracing exists, so
    /// the caller logs this once the subscriber is installed.
    pub setup_warning: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let (overrides, setup_warning) = match setup_config_path() {
            Some(path) => match read_setup_config(&path) {
                Ok(overrides) => (overrides, None),
                Err(err) => (SetupConfigOverrides::default(), Some(format!("{err:#}"))),
            },
            None => (SetupConfigOverrides::default(), None),
        };

        let bot_token = env_string("SENSE_BOT_TOKEN", None)?;
        let group_id = env_string("SENSE_GROUP_ID", None)?
            .parse::<i64>()
            .context("invalid SENSE_GROUP_ID")?;
        let bot_name = env_string("SENSE_BOT_NAME", None)?
            .trim_start_matches('@')
            .to_string();
        let telegram_api_url =
            env_string("SENSE_TELEGRAM_API_URL", Some(DEFAULT_TELEGRAM_API_URL.to_string()))?;

        let status_url = env_string("SENSE_STATUS_URL", None)?;
        let status_credentials = match (
            env_optional("SENSE_AUTH_USER"),
            env_optional("SENSE_AUTH_PASS"),
        ) {
            (None, None) => None,
            (username, password) => Some(Credentials {
                username: username.unwrap_or_default(),
                password: password.unwrap_or_default(),
            }),
        };
        let poll_interval_secs = env_u64("SENSE_POLL_INTERVAL_SECS", Some(3))?;
        if poll_interval_secs == 0 {
            return Err(anyhow!("SENSE_POLL_INTERVAL_SECS must be positive"));
        }
        let fetch_timeout_secs = env_u64("SENSE_FETCH_TIMEOUT_SECS", Some(10))?.max(1);

        let report_times = match env_optional("SENSE_REPORT_TIMES") {
            Some(raw) => parse_report_times(&raw).context("invalid SENSE_REPORT_TIMES")?,
            None => match overrides.report_times.as_deref() {
                Some(times) => parse_time_list(times.iter().map(String::as_str))
                    .context("invalid report_times in setup config")?,
                None => parse_report_times(DEFAULT_REPORT_TIMES)?,
            },
        };

        let output_name = env_optional("SENSE_OUTPUT_NAME")
            .or_else(|| {
                overrides
                    .output_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string());

        let timezone_raw = env_string("SENSE_TIMEZONE", Some(DEFAULT_TIMEZONE.to_string()))?;
        let timezone = timezone_raw
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid SENSE_TIMEZONE {timezone_raw:?}: {err}"))?;

        let http_bind = env_string("SENSE_HTTP_BIND", Some("0.0.0.0:8777".to_string()))?;
        let webhook_host = env_optional("SENSE_WEBHOOK_HOST");
        let webhook_path = normalize_webhook_path(&env_string(
            "SENSE_WEBHOOK_PATH",
            Some("/".to_string()),
        )?);
        let webhook_secret = env_optional("SENSE_WEBHOOK_SECRET");

        let default_camera_channel =
            u32::try_from(env_u64("SENSE_DEFAULT_CAMERA_CHANNEL", Some(17))?)
                .context("invalid SENSE_DEFAULT_CAMERA_CHANNEL")?;
        let cameras = CameraDirectory::new(overrides.cameras, overrides.default_camera_chat_id);

        Ok(Self {
            bot_token,
            group_id,
            bot_name,
            telegram_api_url,
            status_url,
            status_credentials,
            poll_interval_secs,
            fetch_timeout_secs,
            report_times,
            output_name,
            timezone,
            http_bind,
            webhook_host,
            webhook_path,
            webhook_secret,
            cameras,
            default_camera_channel,
            otlp_endpoint: env_optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
            setup_warning,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn webhook_url(&self) -> Option<String> {
        let host = self.webhook_host.as_deref()?;
        let host = host
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        Some(format!("https://{host}{}", self.webhook_path))
    }
}

/// Accepts a JSON array (`["09:00","17:30"]`) or a comma separated list.
pub fn parse_report_times(raw: &str) -> Result<Vec<ReportTime>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        let mut bytes = trimmed.as_bytes().to_vec();
        let items: Vec<String> =
            simd_json::serde::from_slice(&mut bytes).context("report times are not a JSON array of strings")?;
        return parse_time_list(items.iter().map(String::as_str));
    }
    parse_time_list(trimmed.split(','))
}

fn parse_time_list<'a>(items: impl Iterator<Item = &'a str>) -> Result<Vec<ReportTime>> {
    let mut times = Vec::new();
    for item in items {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        times.push(item.parse::<ReportTime>()?);
    }
    Ok(times)
}

fn normalize_webhook_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
