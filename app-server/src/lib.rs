#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::{self};
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use warden_backend_client::Client as BackendClient;
use warden_core::AvailableShells;
use warden_core::Config;
use warden_core::ConfigOverrides;
use warden_core::EngineConfig;
use warden_core::ExecutionEngine;
use warden_core::detect_available;
use warden_protocol::InboundMessage;
use warden_protocol::OutboundMessage;
use warden_state::MissionStore;
use warden_utils_home_dir::find_warden_home;

use crate::message_processor::MessageProcessor;
use crate::outgoing_message::OutgoingMessageSender;

mod message_processor;
mod outgoing_message;

/// Size of the bounded channels used to communicate between tasks.
const CHANNEL_CAPACITY: usize = 128;

/// Loads the configuration, falling back to defaults when the file cannot be
/// parsed. The second element holds warnings to log once tracing is up.
pub fn load_config(overrides: ConfigOverrides) -> anyhow::Result<(Config, Vec<String>)> {
    let warden_home = find_warden_home().context("failed to locate warden home")?;
    match Config::load_from_home(warden_home.clone(), overrides.clone()) {
        Ok(config) => Ok((config, Vec::new())),
        Err(err) => {
            let warning = format!("Invalid configuration; using defaults. {err}");
            Ok((Config::with_defaults(warden_home, overrides), vec![warning]))
        }
    }
}

/// Installs a stderr subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let _ = tracing_subscriber::registry().with(stderr_fmt).try_init();
}

/// Opens the mission store and attaches the backend mirror when configured.
pub fn open_store(config: &Config) -> Arc<MissionStore> {
    let store = MissionStore::open(config.missions_path());
    let store = match &config.backend {
        Some(backend) => match BackendClient::new(&backend.api_url, &backend.api_key) {
            Ok(client) => {
                info!(api_url = %backend.api_url, "backend mirror enabled");
                store.with_mirror(Arc::new(client))
            }
            Err(err) => {
                warn!("backend mirror disabled: {err}");
                store
            }
        },
        None => store,
    };
    Arc::new(store)
}

pub async fn run_main(overrides: ConfigOverrides) -> anyhow::Result<()> {
    let (config, warnings) = load_config(overrides)?;
    init_tracing(&config.log_level);
    for warning in &warnings {
        error!("{warning}");
    }
    info!(agent = %config.agent_name, "starting warden app server");
    let shells = detect_available();
    run_with_io(config, shells, io::stdin(), io::stdout()).await
}

/// Serves line-delimited JSON from `reader`, writing replies and events to
/// `writer`. Returns once `reader` reaches EOF and every in-flight message
/// has been written.
pub async fn run_with_io<R, W>(
    config: Config,
    shells: AvailableShells,
    reader: R,
    writer: W,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (incoming_tx, mut incoming_rx) = mpsc::channel::<InboundMessage>(CHANNEL_CAPACITY);
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<OutboundMessage>(CHANNEL_CAPACITY);

    let store = open_store(&config);
    if config.backend.is_some() {
        store.sync_from_backend().await;
    }

    let outgoing = Arc::new(OutgoingMessageSender::new(outgoing_tx));
    let engine = ExecutionEngine::new(EngineConfig::from(&config), shells, outgoing.clone())
        .with_approval_provider(outgoing.clone());
    let processor = MessageProcessor::new(outgoing, Arc::new(engine), store);

    // Task: read from `reader`, push to `incoming_tx`.
    // Lines are read as raw bytes so one undecodable line is skipped rather
    // than ending the session.
    let reader_handle = tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    error!("failed to read from client: {e}");
                    break;
                }
            }
            if line.trim_ascii().is_empty() {
                continue;
            }
            match serde_json::from_slice::<InboundMessage>(&line) {
                Ok(msg) => {
                    if incoming_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("ignoring malformed message: {e}"),
            }
        }
        debug!("reader finished (EOF)");
    });

    // Task: process incoming messages.
    let processor_handle = tokio::spawn(async move {
        while let Some(msg) = incoming_rx.recv().await {
            processor.process_message(msg).await;
        }
        processor.shutdown().await;
        info!("processor task exited (channel closed)");
    });

    // Task: write outgoing messages to `writer`.
    let writer_handle = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(outgoing_message) = outgoing_rx.recv().await {
            match serde_json::to_string(&outgoing_message) {
                Ok(mut json) => {
                    json.push('\n');
                    if let Err(e) = writer.write_all(json.as_bytes()).await {
                        error!("Failed to write message: {e}");
                        break;
                    }
                    if let Err(e) = writer.flush().await {
                        error!("Failed to flush writer: {e}");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize OutboundMessage: {e}"),
            }
        }
        info!("writer exited (channel closed)");
    });

    // The typical exit path is EOF on the reader, which drops `incoming_tx`
    // and ends the processor. The writer ends once the processor and every
    // spawned execution have released their senders.
    let _ = tokio::join!(reader_handle, processor_handle, writer_handle);

    Ok(())
}
