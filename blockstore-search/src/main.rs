use std::process::ExitCode;

use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use blockstore_search::ingest;
use blockstore_search::{Dependencies, IndexingError, LogFormat, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(LogFormat::default());
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.log_format);

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Search indexer failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(settings: Settings) -> Result<(), IndexingError> {
    info!("Starting blockstore search indexer");

    let mut deps = Dependencies::new(&settings).await?;
    let failed_logger = deps
        .take_failed_batches()
        .map(|rx| tokio::spawn(ingest::log_failed_batches(rx)));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    let stats = ingest::run(
        BufReader::new(tokio::io::stdin()),
        &deps.indexers,
        shutdown,
    )
    .await;

    // Flush any remaining documents, even if ingest stopped on an error
    let shutdown_result = deps.shutdown().await;

    // Indexers hold the failed-batch senders; release them so the logger ends
    drop(deps);
    if let Some(handle) = failed_logger {
        match handle.await {
            Ok(dropped) if dropped > 0 => warn!(dropped, "Documents dropped during run"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed-batch logger panicked"),
        }
    }

    stats?;
    shutdown_result?;
    info!("Search indexer shutdown complete");
    Ok(())
}
