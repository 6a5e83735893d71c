//! Dev command implementation.

use crate::cli::DevArgs;
use crate::commands::utils;
use crate::dev::reload::SCRIPT_PATH;
use crate::dev::{DevConfig, DevServerOrchestrator};
use crate::error::{Result, ResultExt};
use crate::ui;

/// Execute the dev command.
///
/// # Process Flow
///
/// 1. Load configuration with command-line overrides
/// 2. Build every task, bind the server and start watching
/// 3. Run until Ctrl+C or a fatal watcher error
/// 4. Stop gracefully
///
/// # Errors
///
/// Returns startup failures (invalid config, initial build failure, port in
/// use, missing root) and fatal watcher errors. Build failures after startup
/// are reported and the server keeps running.
pub async fn execute(args: DevArgs) -> Result<()> {
    ui::info("Starting development server...");

    let cwd = utils::get_cwd()?;
    let project = utils::load_config(&args.config, &args.overrides(&cwd))?;
    let config = DevConfig::from_config(project, args.clean)?;
    ui::info(&format!("Serving {}", config.server.root.display()));

    let mut handle = DevServerOrchestrator::new(config)?.start().await?;

    ui::success(&format!("Dev server running at {}", handle.url()));
    if let Some(reload) = handle.reload_channel() {
        let origin = match handle.reload_addr() {
            Some(addr) => format!("http://{}", addr),
            None => String::new(),
        };
        tracing::debug!(sessions = reload.session_count(), "live reload ready");
        ui::info(&format!(
            "Live reload: add <script src=\"{}{}\"></script> to your pages",
            origin, SCRIPT_PATH
        ));
    }
    ui::info("Press Ctrl+C to stop");

    tokio::select! {
        result = handle.wait() => return result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
    }

    ui::info("Shutting down...");
    handle.stop().await?;
    ui::success("Server stopped");
    Ok(())
}
