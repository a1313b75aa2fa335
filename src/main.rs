//! `festcache`: inspect and maintain a persisted festival cache.
//!
//! ```bash
//! festcache --dir ~/.festcache stats
//! festcache --dir ~/.festcache invalidate --tag festivals
//! RUST_LOG=festival_cache=debug festcache inspect
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use festival_cache::cli::{execute, Cli};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("festival_cache=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    execute(&cli, &mut stdout.lock())?;
    Ok(())
}
