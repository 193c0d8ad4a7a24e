use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use subproxy::{Gateway, Registry, Server};

/// Subdomain-routed reverse proxy for a set of web applications.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML file listing the backends (`name`, `url`, `subdomain`, `image`).
    #[arg(short, long, env = "SUBPROXY_CONFIG", default_value = "webapps.yml")]
    config: PathBuf,

    /// Address to listen on.
    #[arg(short, long, env = "SUBPROXY_LISTEN", default_value = "0.0.0.0:8000")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> subproxy::Result<()> {
    let registry = Registry::load(&args.config)?;
    let server = Server::bind(args.listen).await?;
    server.serve(Gateway::new(Arc::new(registry))).await
}
