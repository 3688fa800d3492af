//! Hoplink - A horizontally scalable short-URL service
//!
//! Single execution mode: the HTTP server. Configuration comes from
//! `hoplink.toml` plus environment overrides; see config/structs.rs.

use color_eyre::Result;
use dotenv::dotenv;

use hoplink::config;
use hoplink::runtime::modes::server;
use hoplink::system::logging;

#[actix_web::main]
async fn main() -> Result<(), color_eyre::Report> {
    // Setup global error handling
    color_eyre::install()?;

    // Load environment variables
    dotenv().ok();

    // Initialize configuration system
    config::init_config();
    let app_config = config::get_config();

    // Initialize logging (guard must stay alive for the process lifetime)
    let _log_guard = logging::init_logging(&app_config.logging);

    server::run_server(&app_config)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;

    Ok(())
}
