use std::path::PathBuf;

use clap::Parser;

use weft_router::{Router, RouterConfig};

#[derive(Parser)]
#[command(name = "weftd", about = "Border router for the weft inter-domain fabric")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/weft/router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        weft_router::logging::init_json();
    } else {
        weft_router::logging::init();
    }

    let config = match RouterConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    let mut router = match Router::new(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to build router: {e}");
            std::process::exit(1);
        }
    };
    let handle = router.shutdown_handle();

    // Spawn signal handler
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    if let Err(e) = router.start().await {
        tracing::error!("failed to start router: {e}");
        std::process::exit(1);
    }

    router.run().await;
    router.shutdown().await;
}
