//! CLI entrypoint: configuration, logging and service wiring.

mod config;
mod daemon;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use channels::{
    LongPolling, TelegramTransport, UPDATE_QUEUE_CAPACITY, UpdateSource, WebhookSource,
    build_bot, webhook_router,
};
use clap::{Parser, Subcommand};
use config::Config;
use gateway::{
    ApprovalRegistry, ApprovalService, Catalog, OutcomeNotifier, ReadyFlag, UpdateDispatcher,
    router,
};
use proto::{ChatTransport, ReviewerUpdate};
use speech::OpenAiTranscriber;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Human-in-the-loop approval gateway backed by a Telegram chat.
#[derive(Parser)]
#[command(name = "telegram-approver")]
#[command(about = "Telegram approval gateway for automated tool calls", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug logging to ~/.telegram-approver/logs/debug.log
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the approval service (default)
    Serve,
    /// Validate configuration and print a redacted summary
    Check,
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Serve => "serve",
            Commands::Check => "check",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    let _file_guard = init_tracing(&cli.log_level, cli.debug);
    if cli.debug {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            command = command.label(),
            log_level = %cli.log_level,
            "========== telegram-approver start =========="
        );
    }

    let config = Config::load(cli.config.as_deref()).context("invalid configuration")?;

    match command {
        Commands::Serve => cmd_serve(config).await,
        Commands::Check => {
            println!("{}", config.summary());
            Ok(())
        }
    }
}

/// Console logging, plus a daily-rotated debug file when `debug` is set.
///
/// The returned guard flushes the file writer and must outlive `main`.
fn init_tracing(
    log_level: &str,
    debug: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_dir = debug.then(|| {
        Config::home_dir()
            .unwrap_or_else(|| PathBuf::from(".telegram-approver"))
            .join("logs")
    });

    match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir).ok();
            let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let console = fmt::layer().with_target(false).with_filter(console_filter);
            let file = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(
                    "debug,hyper_util=info,rustls=info,reqwest=info,teloxide=info",
                ));
            tracing_subscriber::registry()
                .with(console)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            fmt()
                .with_env_filter(console_filter)
                .with_target(false)
                .init();
            None
        }
    }
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    info!(
        chat_id = config.telegram.chat_id,
        mode = config.update_mode(),
        addr = %config.http.addr,
        "Starting telegram-approver"
    );

    let catalog = Arc::new(Catalog::load(&config.approval.lang)?);
    let registry = Arc::new(ApprovalRegistry::new());
    let bot = build_bot(&config.telegram.token)?;
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(
        bot.clone(),
        config.telegram.chat_id,
    ));

    let timeout_message =
        Some(config.approval.timeout_message.clone()).filter(|m| !m.trim().is_empty());
    let notifier = Arc::new(OutcomeNotifier::new(
        transport.clone(),
        catalog.clone(),
        config.callback_timeout(),
        timeout_message.clone(),
    ));

    let mut service = ApprovalService::new(
        registry.clone(),
        transport.clone(),
        catalog.clone(),
        notifier.clone(),
        config.approval_timeout(),
    );
    if let Some(message) = timeout_message {
        service = service.with_timeout_reason(message);
    }

    let mut dispatcher = UpdateDispatcher::new(
        registry,
        transport,
        catalog,
        notifier,
        config.telegram.chat_id,
    );
    if config.voice_enabled() {
        info!(model = %config.speech.model, "Voice replies enabled");
        dispatcher = dispatcher.with_transcriber(Arc::new(OpenAiTranscriber::new(
            config.speech.openai_api_key.clone(),
            config.speech.model.clone(),
            config.stt_timeout(),
        )));
    }

    let (update_tx, update_rx) = mpsc::channel::<ReviewerUpdate>(UPDATE_QUEUE_CAPACITY);
    let dispatcher_task = tokio::spawn(dispatcher.run(update_rx));

    let ready = ReadyFlag::new();
    let mut app = router(service, ready.clone());
    let (stop_tx, stop_rx) = watch::channel(false);

    let listener = tokio::net::TcpListener::bind(&config.http.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http.addr))?;
    info!(addr = %config.http.addr, "HTTP server listening");

    let source_task = if config.webhook_enabled() {
        app = app.merge(webhook_router(
            config.telegram.webhook_secret.clone(),
            update_tx.clone(),
        ));
        let source = WebhookSource::new(
            bot,
            &config.telegram.webhook_url,
            config.telegram.webhook_secret.clone(),
        )?;
        source
            .register()
            .await
            .context("failed to register Telegram webhook")?;
        spawn_source(source, update_tx, stop_rx.clone(), ready.clone())
    } else {
        spawn_source(
            LongPolling::new(bot),
            update_tx,
            stop_rx.clone(),
            ready.clone(),
        )
    };

    let mut server_stop = stop_rx;
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_stop.wait_for(|stop| *stop).await;
            })
            .await
    });
    ready.set(true);

    tokio::select! {
        _ = daemon::wait_for_shutdown() => {}
        result = &mut server => {
            ready.set(false);
            let _ = stop_tx.send(true);
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::anyhow!("HTTP server failed: {e}")),
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {e}")),
            };
        }
    }

    ready.set(false);
    let _ = stop_tx.send(true);

    let limit = config.shutdown_timeout();
    if daemon::drain("HTTP server", &mut server, limit).await {
        info!("HTTP server stopped");
    } else {
        server.abort();
    }
    daemon::drain("update source", source_task, limit).await;
    daemon::drain("update dispatcher", dispatcher_task, limit).await;

    info!("telegram-approver stopped");
    Ok(())
}

/// Runs an update source; readiness is cleared if it fails.
fn spawn_source<S>(
    source: S,
    tx: mpsc::Sender<ReviewerUpdate>,
    shutdown: watch::Receiver<bool>,
    ready: ReadyFlag,
) -> JoinHandle<()>
where
    S: UpdateSource + 'static,
{
    tokio::spawn(async move {
        let name = source.name();
        info!(source = name, "Update source starting");
        if let Err(e) = source.run(tx, shutdown).await {
            ready.set(false);
            error!(source = name, "Update source failed: {e}");
        }
    })
}
