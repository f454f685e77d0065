mod app;

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};

use shelf_core::{
    config::{self, AppConfig},
    Library,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;

    let (mut library, report) = Library::open(&config.data_file, config.load_policy)
        .with_context(|| format!("failed to open {}", config.data_file.display()))?;
    if config.seed_demo && library.seed_demo()? {
        info!("Empty library seeded with sample data");
        if config.autosave {
            library.save(&config.data_file)?;
        }
    }

    let mut app = app::ShelfApp::new(library, config, &report);
    app.run()
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("shelf.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the UI, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
