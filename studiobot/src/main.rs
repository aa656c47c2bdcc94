//! `StudioBot` -- studio task notification bot.
//!
//! Watches the shared task collection through the gateway, announces
//! changes on the studio chat channel, sends scheduled digests, and answers
//! chat commands.
//!
//! # Usage
//!
//! ```bash
//! # Run against a local gateway, notifications to the "studio" channel
//! cargo run --bin studiobot -- --gateway ws://127.0.0.1:9100/ws --channel studio
//!
//! # Or via environment variables
//! GATEWAY_URL=ws://127.0.0.1:9100/ws BOT_CHANNEL=studio cargo run --bin studiobot
//! ```

use std::path::Path;

use clap::Parser;

use studiobot::bot;
use studiobot::config::{BotConfig, CliArgs};

fn main() {
    let cli = CliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match BotConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // The guard flushes buffered file output when dropped at exit.
    let _log_guard = init_logging(&config);

    tracing::info!(
        gateway = %config.gateway_url,
        client_id = %config.client_id,
        channel = config.channel.as_deref().unwrap_or("<none, logging only>"),
        timezone = %config.timezone,
        "starting studiobot"
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(bot::run(config)) {
        tracing::error!(error = %e, "bot stopped");
        std::process::exit(1);
    }
}

/// Console logging via `EnvFilter`, plus an optional non-blocking log file.
fn init_logging(config: &BotConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if let Some(path) = &config.log_file {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let file_name = path
            .file_name()
            .map_or_else(|| std::ffi::OsString::from("studiobot.log"), ToOwned::to_owned);
        let appender =
            tracing_appender::rolling::never(dir.unwrap_or_else(|| Path::new(".")), file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        None
    }
}
