use clap::Parser;
use logweb_app_server::WebConfig;
use logweb_app_server::logging;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Log search web server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides `server.listen` from the configuration file.
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = match cli.config.as_deref() {
        Some(path) => WebConfig::load(path)?,
        None => WebConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    logging::init(config.logging.filter.as_deref());
    logweb_app_server::run(config).await
}
