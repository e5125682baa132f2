#![cfg(not(tarpaulin_include))]

use chart_studio::{Config, app};

/// Main entry point for the chart studio web server
///
/// Initializes logging from `RUST_LOG`, loads configuration from the
/// environment and serves the REST API until Ctrl+C or SIGTERM.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    app::run(config).await
}
