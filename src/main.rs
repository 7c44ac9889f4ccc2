mod camera;
mod commands;
mod config;
mod engine;
mod fetcher;
mod format;
mod http;
mod monitor;
mod notifier;
mod report;
mod status;
#[cfg(test)]
mod test_support;

use crate::camera::CameraClient;
use crate::commands::CommandHandler;
use crate::config::Config;
use crate::engine::EngineState;
use crate::fetcher::HttpStatusSource;
use crate::monitor::Monitor;
use crate::notifier::TelegramNotifier;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing(config: &Config) -> Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime::Tokio, trace::Config as OTelTraceConfig, Resource};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sense_monitor=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    if let Some(endpoint) = &config.otlp_endpoint {
        let endpoint = normalize_otlp_http_endpoint(endpoint);
        let exporter = opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(endpoint);
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(OTelTraceConfig::default().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "sense-monitor"),
            ])))
            .install_batch(Tokio)?;

        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

fn normalize_otlp_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.contains("/v1/traces") {
        return trimmed.to_string();
    }
    format!("{}/v1/traces", trimmed.trim_end_matches('/'))
}

async fn register_with_transport(notifier: &TelegramNotifier, config: &Config) {
    if let Err(err) = notifier.register_commands().await {
        tracing::warn!(error = %err, "failed to register bot commands");
    }
    let Some(url) = config.webhook_url() else {
        tracing::info!("SENSE_WEBHOOK_HOST not set; skipping webhook registration");
        return;
    };
    match notifier
        .register_webhook(&url, config.webhook_secret.as_deref())
        .await
    {
        Ok(()) => tracing::info!(url = %url, "webhook registered"),
        Err(err) => tracing::warn!(url = %url, error = %err, "failed to register webhook"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;
    if let Some(warning) = &config.setup_warning {
        tracing::warn!(error = %warning, "setup config ignored; using env only");
    }
    let report_times: Vec<String> = config.report_times.iter().map(ToString::to_string).collect();
    tracing::info!(
        status_url = %config.status_url,
        poll_interval_secs = config.poll_interval_secs,
        ?report_times,
        timezone = %config.timezone,
        cameras = config.cameras.len(),
        "sense-monitor starting"
    );

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("failed to build http client")?;

    let source = Arc::new(HttpStatusSource::new(
        client.clone(),
        config.status_url.clone(),
        config.status_credentials.clone(),
        config.fetch_timeout(),
    ));
    let notifier = Arc::new(TelegramNotifier::new(
        client.clone(),
        &config.telegram_api_url,
        &config.bot_token,
        config.group_id,
    ));
    let engine = engine::shared(EngineState::new(&config.report_times));
    let monitor = Monitor::new(
        source,
        notifier.clone(),
        engine,
        &config.output_name,
        config.poll_interval(),
        config.timezone,
    );
    let camera = Arc::new(CameraClient::new(
        client,
        config.cameras.clone(),
        config.fetch_timeout(),
        config.default_camera_channel,
    ));

    if config.cameras.is_empty() {
        tracing::info!("no cameras configured; snapshot commands will reply with an error");
    }
    register_with_transport(&notifier, &config).await;

    let monitor_handle = tokio::spawn(monitor.clone().run());
    let report_handle = tokio::spawn(report::run_scheduler(monitor.clone()));

    let app = http::router(
        http::HttpState {
            commands: CommandHandler::new(monitor, camera),
            group_id: config.group_id,
            bot_name: Arc::from(config.bot_name.as_str()),
            secret: config.webhook_secret.as_deref().map(Arc::from),
        },
        &config.webhook_path,
    );
    let listener = tokio::net::TcpListener::bind(&config.http_bind)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind))?;
    tracing::info!(bind = %config.http_bind, path = %config.webhook_path, "webhook listener ready");
    let mut http_handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "webhook listener exited");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        _ = &mut http_handle => {}
    }

    monitor_handle.abort();
    report_handle.abort();
    http_handle.abort();
    Ok(())
}
