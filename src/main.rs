//! simwatch binary: load configuration, start logging, follow the manager
//! until the connection ends.

use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};

use simwatch::config::{Cli, Config};
use simwatch::render::TextRenderer;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("simwatch: configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Logs go to stderr; stdout carries the operator view.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    info!("simwatch v{} starting", env!("CARGO_PKG_VERSION"));

    let renderer = TextRenderer::new(
        std::io::stdout(),
        config.display.log_window,
        config.display.show_runs,
    );
    let input = BufReader::new(tokio::io::stdin());

    let code = match simwatch::client::run(&config, renderer, input).await {
        Ok(_) => 0,
        Err(e) => {
            error!("{e}");
            1
        }
    };

    // Exit explicitly: a pending stdin read would otherwise hold the runtime open.
    std::process::exit(code);
}
