use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use venue_probe::transport::WsChannel;
use venue_probe::{Config, Dispatcher, Outcome};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    // 1. Initialize logger
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,venue_probe=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    tracing::info!("🦀 Venue probe starting...");

    // 2. Load config
    let path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = Config::load_or_default(path.as_deref())?;
    config.apply_env();
    config.validate()?;

    // 3. Connect and run the session
    let mut channel = WsChannel::connect(&config.connection.url).await?;
    let mut dispatcher = Dispatcher::new(&config);

    let code = match dispatcher.run(&mut channel).await {
        Ok(Outcome::Completed) => {
            if let Err(e) = channel.close().await {
                tracing::warn!("close handshake failed: {}", e);
            }
            ExitCode::SUCCESS
        }
        Ok(Outcome::Closed(kind)) => {
            tracing::info!("{} in phase {:?}", kind, dispatcher.workflow().phase());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("session aborted: {}", e);
            if let Err(e) = channel.close().await {
                tracing::warn!("close handshake failed: {}", e);
            }
            ExitCode::FAILURE
        }
    };

    tracing::info!("done");
    Ok(code)
}
