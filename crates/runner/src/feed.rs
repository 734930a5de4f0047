//! Payload ingestion and the single merging task.

use metrics::SharedMetrics;
use orderbook::{MergeOutcome, SharedBookMerger};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::RunnerError;

/// Read newline-delimited JSON payloads and queue them for merging.
///
/// Blank lines are skipped and lines that are not JSON are counted and
/// skipped. Stops at end of input or when shutdown is signalled; dropping the
/// sender then lets the merging task drain and finish. Returns the number of
/// payloads queued.
pub async fn read_payloads<R>(
    reader: R,
    sender: mpsc::Sender<Value>,
    metrics: SharedMetrics,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<usize, RunnerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut queued = 0;
    let mut line_number = 0usize;

    loop {
        let line = tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(queued, "Shutdown requested, stopping reader");
                    break;
                }
                continue;
            }

            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            debug!(queued, "End of input");
            break;
        };
        line_number += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(payload) => {
                sender
                    .send(payload)
                    .await
                    .map_err(|_| RunnerError::ChannelClosed)?;
                queued += 1;
            }
            Err(e) => {
                metrics.inc_parse_errors();
                warn!(line = line_number, error = %e, "Skipping line that is not JSON");
            }
        }
    }

    Ok(queued)
}

/// Merge queued payloads one at a time until the channel closes.
///
/// This is the only writer of the book. Returns the number of payloads that
/// changed it.
pub async fn run_merger(
    mut receiver: mpsc::Receiver<Value>,
    merger: SharedBookMerger,
    metrics: SharedMetrics,
) -> u64 {
    let mut applied = 0;

    while let Some(payload) = receiver.recv().await {
        metrics.inc_messages_received();

        match merger.merge_value(payload) {
            Ok(outcome) => {
                metrics.add_malformed_records(outcome.skipped() as u64);
                match outcome {
                    MergeOutcome::SnapshotLoaded { bids, asks, .. } => {
                        metrics.inc_snapshots_applied();
                        info!(bids, asks, "Snapshot applied");
                        applied += 1;
                    }
                    MergeOutcome::Updated { .. } => {
                        metrics.inc_updates_applied();
                        applied += 1;
                    }
                    MergeOutcome::Dropped => {
                        metrics.inc_updates_dropped();
                    }
                }
            }
            Err(e) => {
                metrics.inc_rejected_payloads();
                warn!(error = %e, "Payload rejected");
            }
        }
    }

    applied
}
