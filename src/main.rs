use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vectormatch::{start_server, Store, DEFAULT_DIMENSION};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "vectormatch - A persistent vector similarity service for candidate/position matching",
    long_about = None
)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Embedding dimension; must match the model producing the vectors
    #[arg(long, env = "VECTORMATCH_DIM", default_value_t = DEFAULT_DIMENSION)]
    dim: usize,

    /// Directory holding the persisted vector, state, and index files
    #[arg(long, env = "VECTORMATCH_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    info!("Starting vectormatch server...");
    info!("Host: {}", args.host);
    info!("Port: {}", args.port);
    info!("Dimension: {}", args.dim);
    info!("Data dir: {}", args.data_dir.display());

    let store = Store::open(args.dim, &args.data_dir)?;

    start_server(store, &args.host, args.port).await?;

    Ok(())
}
