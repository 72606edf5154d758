use anyhow::Result;
use fsmonitor::{Exit, MonitorConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = MonitorConfig::load()?;
    init_tracing(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "fsmonitor starting");

    // Stdin reads block, so the protocol loop gets its own thread.
    let session = tokio::task::spawn_blocking(move || {
        fsmonitor::serve(&config, std::io::stdin().lock(), std::io::stdout())
    });

    let code = tokio::select! {
        joined = session => match joined {
            Ok(Ok(exit)) => exit.code(),
            Ok(Err(e)) => {
                error!("Session failed: {e}");
                1
            }
            Err(e) => {
                error!("Session task failed: {e}");
                1
            }
        },
        () = shutdown_signal() => {
            info!("Interrupted, shutting down");
            Exit::Interrupted.code()
        }
    };

    // Skip runtime teardown: the blocking reader may still sit on stdin.
    std::process::exit(code);
}

fn init_tracing(config: &MonitorConfig) -> Result<()> {
    // Stdout carries the protocol, logs go to stderr only.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
