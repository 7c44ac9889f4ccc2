use crate::camera::CameraClient;
use crate::fetcher::StatusSource;
use crate::format;
use crate::monitor::Monitor;
use crate::notifier::Notifier;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Initialize,
    GetStatus,
    GetSnapshot { channel: Option<u32> },
    InvalidSnapshotChannel,
}

/// Recognizes `/start@bot`, `/get_info@bot` and `/get_cam@bot [channel]`.
/// Commands addressed to another bot, or without a bot suffix, are ignored.
pub fn parse_command(text: &str, bot_name: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (command, addressed) = rest.split_once('@')?;

    let argument = addressed.strip_prefix(bot_name)?;

    match command {
        "start" | "get_info" if !argument.is_empty() => None,
        "start" => Some(Command::Initialize),
        "get_info" => Some(Command::GetStatus),
        "get_cam" => {
            let argument = argument.trim();
            if argument.is_empty() {
                return Some(Command::GetSnapshot { channel: None });
            }
            match argument.parse::<u32>() {
                Ok(channel) => Some(Command::GetSnapshot {
                    channel: Some(channel),
                }),
                Err(_) => Some(Command::InvalidSnapshotChannel),
            }
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text { text: String, rich: bool },
    Image(Vec<u8>),
}

impl Reply {
    fn plain(text: &str) -> Self {
        Reply::Text {
            text: text.to_string(),
            rich: false,
        }
    }
}

pub struct CommandHandler<S, N> {
    monitor: Monitor<S, N>,
    camera: Arc<CameraClient>,
}

impl<S, N> Clone for CommandHandler<S, N> {
    fn clone(&self) -> Self {
        Self {
            monitor: self.monitor.clone(),
            camera: self.camera.clone(),
        }
    }
}

impl<S: StatusSource, N: Notifier> CommandHandler<S, N> {
    pub fn new(monitor: Monitor<S, N>, camera: Arc<CameraClient>) -> Self {
        Self { monitor, camera }
    }

    pub fn monitor(&self) -> &Monitor<S, N> {
        &self.monitor
    }

    pub async fn handle(&self, chat_id: i64, command: Command) -> Reply {
        tracing::info!(chat_id, ?command, "handling command");
        match command {
            Command::Initialize => match self.monitor.initialize().await {
                Ok(()) => Reply::plain(format::MONITORING_STARTED),
                Err(err) => {
                    tracing::warn!(error = %err, "initialization fetch failed");
                    Reply::plain(format::INITIAL_FETCH_FAILED)
                }
            },
            Command::GetStatus => match self.monitor.status().await {
                Ok(text) => Reply::Text { text, rich: true },
                Err(err) => {
                    tracing::warn!(error = %err, "status query failed");
                    Reply::plain(format::DATA_UNAVAILABLE)
                }
            },
            Command::GetSnapshot { channel } => match self.camera.snapshot(chat_id, channel).await {
                Ok(image) => Reply::Image(image),
                Err(err) => {
                    tracing::warn!(chat_id, ?channel, error = %err, "camera snapshot failed");
                    Reply::plain(&format::camera_failure(&err))
                }
            },
            Command::InvalidSnapshotChannel => Reply::plain(format::CAMERA_USAGE),
        }
    }
}
