//! Pass-through demo
//!
//! Registers an output callback that copies each bus input to its output,
//! runs it for a few seconds, then shuts everything down.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voicemeeter_remote::{
    connector::{LoginStatus, ParameterValue},
    error::CallbackError,
    AudioEvent, Connector, ConnectorConfig, Mode,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConnectorConfig::load_or_default()?;
    let connector = Connector::load(config).context("loading the Voicemeeter remote library")?;

    if connector.connect()? == LoginStatus::AppNotRunning {
        anyhow::bail!("Voicemeeter is not running");
    }
    let engine = connector.engine_kind()?;
    tracing::info!(
        "{} {} ({} in / {} out channels)",
        engine,
        connector.version()?,
        engine.input_channels(),
        engine.output_channels()
    );

    connector.update_device_list()?;
    for device in connector.output_devices() {
        println!("  output: {} [{:?}]", device.name, device.driver);
    }
    if let ParameterValue::Text(label) = connector.get_parameter("Bus[0].Label")? {
        println!("  bus 0: {label}");
    }

    let blocks = Arc::new(AtomicU64::new(0));
    let counter = blocks.clone();
    connector.callbacks().register_audio_callback(
        Mode::Output,
        "passthrough-demo",
        move |error: Option<CallbackError>, event: Option<&mut AudioEvent<'_>>| {
            if let Some(error) = error {
                tracing::error!("Audio callback error: {error}");
                return;
            }
            let Some(event) = event else { return };
            match event.buffer_mut() {
                Some(buffer) => {
                    buffer.pass_through();
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                None => tracing::info!("{:?} at {:?}", event.command(), event.info()),
            }
        },
    )?;

    connector.callbacks().start_audio_callback().await?;
    tracing::info!("Passing audio through for 5 seconds");
    tokio::time::sleep(Duration::from_secs(5)).await;
    connector.callbacks().stop_audio_callback().await?;

    tracing::info!("Processed {} blocks", blocks.load(Ordering::Relaxed));
    connector.disconnect().await?;
    Ok(())
}
