//! Serve command - webhook and scheduler HTTP server

use crate::cli::style::{Stylize, check};
use anstream::println;
use pr_sisyphus::auth::github_app;
use pr_sisyphus::config::Config;
use pr_sisyphus::error::Result;
use pr_sisyphus::queue::Reconciler;
use pr_sisyphus::server::{AppState, SCHEDULER_PATH, run_server};
use pr_sisyphus::sweep::SweepOptions;
use std::sync::Arc;
use tracing::warn;

/// Run the serve command
pub async fn run_serve(config: &Config, listen: Option<&str>) -> Result<()> {
    let app = github_app(&config.github)?;
    let addr = listen.unwrap_or(config.server.listen.as_str());

    if config.github.webhook_secret.is_none() {
        warn!("no webhook secret configured, deliveries are not verified");
    }

    let state = Arc::new(AppState {
        directory: Arc::new(app),
        reconciler: Reconciler::new(config.queue.clone()),
        sweep: SweepOptions::from(&config.sweep),
        webhook_secret: config.github.webhook_secret.clone(),
    });

    println!("{} Serving merge queue on {}", check(), addr.accent());
    println!(
        "  {} POST /webhook, GET {SCHEDULER_PATH}, GET /health",
        "routes:".muted()
    );

    run_server(state, addr).await
}
