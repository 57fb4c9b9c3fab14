//! Session store and distributed lock command-line client.

#![forbid(unsafe_code)]

mod cli_config;
mod commands;
mod store_builder;

use std::env;
use std::io::Write;

use sessionlock_core::AppError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli_config::{CliConfig, init_tracing};
use crate::commands::{Command, run_command};
use crate::store_builder::build_session_service;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = Command::parse(env::args().skip(1))?;
    let config = CliConfig::load()?;
    let service = build_session_service(&config)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, cancelling");
                shutdown.cancel();
            }
            Err(error) => warn!(error = %error, "failed to listen for interrupt"),
        }
    });

    let mut stdout = std::io::stdout().lock();
    run_command(&service, &cancel, command, |output| {
        match serde_json::to_string(&output) {
            Ok(line) => {
                if let Err(error) = writeln!(stdout, "{line}") {
                    warn!(error = %error, "failed to write command output");
                }
            }
            Err(error) => warn!(error = %error, "failed to encode command output"),
        }
    })
    .await
}
