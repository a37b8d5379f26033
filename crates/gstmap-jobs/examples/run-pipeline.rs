//! Run a live extraction job against the portal.
//!
//! Usage:
//!   cargo run --example run-pipeline -- dataset.db AAACA1234F [PAN...]
//!
//! Requires at least one captcha account in the config file
//! (`[[captcha.accounts]]` in `~/.config/gstmap/config.toml`).

use gstmap_captcha::TrueCaptchaSolver;
use gstmap_core::{AppConfig, Pan};
use gstmap_jobs::{JobManager, JobParameters};
use gstmap_portal::DriverProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let dataset = PathBuf::from(
        args.next()
            .ok_or("usage: run-pipeline <dataset.db> <PAN>...")?,
    );
    let pans = args
        .map(|raw| Pan::parse(&raw))
        .collect::<Result<Vec<_>, _>>()?;
    if pans.is_empty() {
        return Err("at least one PAN is required".into());
    }

    let config = AppConfig::load_with_env()?;
    let solver = Arc::new(TrueCaptchaSolver::new(&config.captcha)?);
    let provider = Arc::new(DriverProvider::new(config.clone(), solver));
    let manager = JobManager::new(config, provider);

    let id = manager.submit_extraction(dataset, pans, JobParameters::default())?;
    println!("submitted job {id}");

    loop {
        let snapshot = manager.status(&id)?;
        let progress = &snapshot.progress;
        println!(
            "{:?}: {}/{} processed ({} ok, {} failed)",
            snapshot.status,
            progress.processed,
            progress.total.unwrap_or(0),
            progress.successful,
            progress.failed,
        );
        if snapshot.status.is_terminal() {
            if let Some(error) = snapshot.error {
                println!("job ended with error: {error}");
            }
            break;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Ok(())
}
