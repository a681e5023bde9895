//! GifSync CLI - mirror saved GIFs to and from a local directory

use clap::Parser;
use gifsync::config::{default_output_dir, CliArgs, Commands, LogFormat, PipelineConfig};
use gifsync::core::PipelineReport;
use gifsync::error::{IoResultExt, Result};
use gifsync::progress::ProgressReporter;
use gifsync::remote::{DirectoryRemote, PathLayout};
use gifsync::sync::{download_pipeline, upload_pipeline};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(&args);

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    // Handle result
    match run(&args, &cancel).await {
        Ok(report) => {
            if !args.quiet {
                report.print_summary();
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("Cancelled");
            ExitCode::from(e.exit_code())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(args: &CliArgs) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match args.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

/// Cancel `cancel` on Ctrl-C (and SIGTERM on unix)
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        eprintln!("\nInterrupted, shutting down...");
        cancel.cancel();
    });
}

async fn run(args: &CliArgs, cancel: &CancellationToken) -> Result<PipelineReport> {
    // Build configuration
    let config = PipelineConfig::from_cli(args)?;
    let limiter = config.limiter()?;

    info!(
        jobs = config.jobs,
        rate = %humantime::format_duration(config.rate_interval()),
        burst = config.rate_burst,
        "Configuration loaded"
    );

    let remote = DirectoryRemote::open(args.command.remote(), config.page_size).await?;

    let pipeline = match &args.command {
        Commands::Download { out, .. } => {
            let out = out.clone().unwrap_or_else(default_output_dir);
            tokio::fs::create_dir_all(&out).await.with_path(&out)?;
            info!(path = %out.display(), "Downloading all gifs");
            download_pipeline(&config, remote, limiter, PathLayout::new(out))
        }
        Commands::Upload { input, .. } => upload_pipeline(&config, remote, limiter, input, cancel).await?,
    };

    let pipeline = if args.progress && !args.quiet {
        pipeline.with_progress(Arc::new(ProgressReporter::new()))
    } else {
        pipeline
    };

    pipeline.run(cancel).await
}
