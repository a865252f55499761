use std::process::ExitCode;

use tagbridge_core::config::Config;
use tagbridge_core::daemon::Daemon;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "fatal configuration error");
            return ExitCode::FAILURE;
        }
    };

    let daemon = match Daemon::bootstrap(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "fatal error during daemon bootstrap");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("daemon started");
    if let Err(e) = daemon.run(&config).await {
        tracing::error!(error = %e, "daemon exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
