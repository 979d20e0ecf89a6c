use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod spa;

#[derive(Parser, Debug)]
#[command(author, version, about = "Static host for the STAC catalog explorer")]
struct Args {
    /// Listen address
    #[arg(long, env = "EXPLORER_ADDR", default_value = "127.0.0.1:8000")]
    addr: SocketAddr,

    /// Directory holding index.html and the built assets
    #[arg(long, env = "EXPLORER_ROOT", default_value = ".")]
    root: PathBuf,

    /// Prefix the app is deployed under, e.g. /explorer
    #[arg(long, env = "EXPLORER_BASE_PATH", default_value = "")]
    base_path: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !args.root.join("index.html").is_file() {
        warn!(root = ?args.root, "index.html not found; app routes will return 404");
    }

    let app = spa::router(args.root.clone(), &args.base_path);

    let listener = match tokio::net::TcpListener::bind(args.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("bind {} failed: {err}", args.addr);
            std::process::exit(1);
        }
    };
    info!(
        root = ?args.root,
        base_path = %args.base_path,
        "explorer listening on http://{}",
        args.addr
    );
    if let Err(err) = axum::serve(listener, app).await {
        error!("server stopped: {err}");
    }
}
