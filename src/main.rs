use anyhow::Result;
use dataset_splitter::cli::Cli;
use dataset_splitter::logging::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with default configuration; RUST_LOG overrides
    let logging_config = LoggingConfig::default();
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("Failed to initialize logging: {}", e);
        // Continue without structured logging
    }

    let cli = Cli::new();
    cli.run().await
}
