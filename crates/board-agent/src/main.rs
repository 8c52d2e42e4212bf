//! Presence agent entry point
//!
//! Run with:
//! ```bash
//! cargo run -p board-agent
//! ```
//!
//! Configuration is loaded from environment variables or a `.env` file.

use board_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        address = %config.agent.address(),
        redis = config.redis.is_some(),
        "Configuration loaded"
    );

    if let Err(e) = board_agent::run(config).await {
        error!(error = %e, "Agent failed");
        std::process::exit(1);
    }
}
