//! pricewatch entry point.
//!
//! Mounts one binding on the configured quote endpoint and prints the
//! filtered table. When attached to a terminal, or when polling, it keeps
//! running: each line on stdin is a manual refresh. Logging goes to stderr
//! so stdout carries only the table.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use pricewatch_client::{AssetClient, AssetClientConfig, bind_source};
use pricewatch_core::{AppConfig, Swr};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::render::{View, refresh_status};

mod render;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let search = std::env::args().nth(1).unwrap_or_default();
    tracing::info!(endpoint = %config.endpoint, refresh_interval_ms = config.refresh_interval_ms, "starting pricewatch");

    let client = AssetClient::new(AssetClientConfig::from(&config)).context("failed to build quote client")?;
    let swr = Swr::new(config.swr_options(), config.store_options());
    let mut binding = bind_source(&swr, Arc::new(client));
    let mut view = View::new(search);

    let (tx, mut rx) = mpsc::unbounded_channel();
    binding.subscribe(move |entry| {
        let _ = tx.send(entry.clone());
    });

    let outcome = binding.mount().await;
    let entry = binding.entry();
    if let Some(entry) = &entry {
        view.observe(entry, chrono::Local::now());
    }
    print!("{}", view.screen(entry.as_ref()));
    while rx.try_recv().is_ok() {}

    let polling = binding.start_polling();
    if !polling && !std::io::stdin().is_terminal() {
        tracing::debug!(stats = ?swr.stats(), "done");
        if let Some(Err(err)) = outcome.result() {
            anyhow::bail!("{err}");
        }
        return Ok(());
    }

    let binding = Arc::new(binding);
    let (status_tx, mut statuses) = mpsc::unbounded_channel();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            Some(entry) = rx.recv() => {
                view.observe(&entry, chrono::Local::now());
                print!("{}", view.screen(Some(&entry)));
            }
            Some(outcome) = statuses.recv() => {
                if let Some(status) = refresh_status(&outcome) {
                    println!("{status}");
                }
            }
            line = lines.next_line(), if input_open => match line {
                Ok(Some(_)) => {
                    let binding = Arc::clone(&binding);
                    let status_tx = status_tx.clone();
                    tokio::spawn(async move {
                        let _ = status_tx.send(binding.refresh().await);
                    });
                }
                Ok(None) => {
                    input_open = false;
                    if !polling {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read stdin");
                    input_open = false;
                    if !polling {
                        break;
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(binding);
    tracing::info!(stats = ?swr.stats(), "stopped");
    Ok(())
}
