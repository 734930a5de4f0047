mod error;
mod feed;

use common::BookConfig;
use error::RunnerError;
use feed::{read_payloads, run_merger};
use metrics::{create_metrics, SharedMetrics};
use orderbook::{BookMerger, SharedBookMerger};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    common::init_logging();

    if let Err(e) = run().await {
        error!(error = %e, "Replay failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), RunnerError> {
    let config = BookConfig::from_env();
    config.validate()?;

    let path = std::env::args().nth(1);

    info!(
        symbol = %config.symbol,
        max_depth = config.max_depth,
        source = path.as_deref().unwrap_or("stdin"),
        "Starting book replay"
    );

    let merger = BookMerger::shared(config.symbol.clone(), config.max_depth);
    let metrics = create_metrics();

    let (sender, receiver) = mpsc::channel(config.channel_capacity);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn reader task
    let reader_metrics = metrics.clone();
    let reader_handle = match &path {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            tokio::spawn(read_payloads(
                BufReader::new(file),
                sender,
                reader_metrics,
                shutdown_rx,
            ))
        }
        None => tokio::spawn(read_payloads(
            BufReader::new(tokio::io::stdin()),
            sender,
            reader_metrics,
            shutdown_rx,
        )),
    };

    // Spawn merging task
    let merge_handle = tokio::spawn(run_merger(receiver, Arc::clone(&merger), metrics.clone()));

    // Spawn ctrl_c handler
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating shutdown");
            let _ = shutdown_tx_clone.send(true);
        }
    });

    // Spawn periodic book reporter
    let reporter_handle = tokio::spawn(report_book(
        Arc::clone(&merger),
        metrics.clone(),
        config.report_interval,
        shutdown_tx.subscribe(),
    ));

    let applied = merge_handle.await?;
    let queued = reader_handle.await??;

    info!(queued, applied, "Feed drained, stopping reporter");

    let _ = shutdown_tx.send(true);
    let _ = reporter_handle.await;

    // Print final book and metrics
    let book = merger.snapshot();
    println!("{}", serde_json::to_string_pretty(&*book)?);
    println!("\n{}", metrics.snapshot());

    info!("Shutdown complete");
    Ok(())
}

async fn report_book(
    merger: SharedBookMerger,
    metrics: SharedMetrics,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let book = merger.snapshot();
                let snapshot = metrics.snapshot();
                info!(
                    symbol = %book.symbol,
                    state = ?book.state,
                    best_bid = ?book.best_bid().map(|l| l.price),
                    best_ask = ?book.best_ask().map(|l| l.price),
                    spread = ?book.spread(),
                    bid_levels = book.bid_levels(),
                    ask_levels = book.ask_levels(),
                    status = %snapshot.health_status(),
                    messages = snapshot.messages_received,
                    msgs_per_sec = format!("{:.1}", snapshot.messages_per_second),
                    "Book status"
                );
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
