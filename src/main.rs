use clap::Parser;

use httplog::config::Cli;
use httplog::server;

#[actix_web::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = server::run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
