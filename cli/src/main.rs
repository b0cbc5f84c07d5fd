use clap::Parser;
use riskboard_cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("riskboard=info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    std::process::exit(Cli::parse().run().await);
}
