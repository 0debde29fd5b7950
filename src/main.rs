//! Preflight media-library validator
//!
//! Validates a media library ahead of processing: finds corrupt streams,
//! mistagged or missing languages, truncated subtitles, and files that
//! deviate from their directory siblings.
//!
//! # Usage
//!
//! ```bash
//! preflight check /library --auto
//! preflight check /library --profile anime --depth full
//! preflight profile save anime --audio ja --subs en --require-video
//! ```

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, warn};

use preflight::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel_flag = Arc::new(AtomicBool::new(false));
    {
        let cancel_flag = cancel_flag.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested, finishing current window");
                cancel_flag.store(true, Ordering::SeqCst);
            }
        });
    }

    let result = match cli.command {
        Commands::Check(args) => commands::execute_check_command(args, cancel_flag).await,
        Commands::Profile(command) => commands::execute_profile_command(command).map(|_| false),
    };

    match result {
        // Error-severity findings gate downstream processing.
        Ok(true) => ExitCode::from(1),
        Ok(false) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(2)
        }
    }
}
