//! Live device feed.
//!
//! The telemetry device writes one text record per line to a serial
//! device node (e.g. `/dev/rfcomm0`). [`run_feed`] polls that stream,
//! parses each line and appends the readings to a bounded
//! [`LiveBuffer`] for the real-time view. The loop survives malformed
//! records and read errors, and stops when the shutdown signal fires.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::{watch, RwLock};

use crate::error::FeedError;
use crate::ingest::parse_record;
use crate::models::Reading;

// ---

/// Ring buffer of the most recent live readings.
#[derive(Debug, Clone, Serialize)]
pub struct LiveBuffer {
    // ---
    capacity: usize,
    connected: bool,
    total_received: u64,
    readings: VecDeque<Reading>,
}

pub type SharedLiveBuffer = Arc<RwLock<LiveBuffer>>;

impl LiveBuffer {
    pub fn new(capacity: usize) -> Self {
        // ---
        let capacity = capacity.max(1);
        Self {
            capacity,
            connected: false,
            total_received: 0,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    pub fn shared(capacity: usize) -> SharedLiveBuffer {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    /// Append a reading, evicting the oldest one when full.
    pub fn push(&mut self, reading: Reading) {
        // ---
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
        self.total_received += 1;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Oldest-first copy of the buffered readings.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }
}

/// Counters reported when the feed loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    // ---
    pub accepted: u64,
    pub rejected: u64,
    pub read_errors: u64,
}

/// Open the device node as a line stream.
///
/// Failure is a [`FeedError::Connection`]; the caller should disable the
/// real-time view rather than abort.
pub async fn open_device(path: &Path) -> Result<Lines<BufReader<File>>, FeedError> {
    // ---
    tracing::info!("Attempting connection to: {}", path.display());
    let file = File::open(path).await.map_err(|source| FeedError::Connection {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Connection successful: {}", path.display());
    Ok(BufReader::new(file).lines())
}

/// Poll `lines` until shutdown or end of stream.
///
/// Each tick waits at most `poll_interval` for a line. A tick without data
/// is skipped; malformed records and read errors are logged and skipped.
pub async fn run_feed<R>(
    mut lines: Lines<R>,
    buffer: SharedLiveBuffer,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) -> FeedStats
where
    R: AsyncBufRead + Unpin,
{
    // ---
    let mut stats = FeedStats::default();
    buffer.write().await.set_connected(true);

    loop {
        if *shutdown.borrow() {
            tracing::info!("Live feed shutting down");
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    tracing::info!("Shutdown channel closed, stopping live feed");
                    break;
                }
            }
            next = tokio::time::timeout(poll_interval, lines.next_line()) => match next {
                // No data this tick
                Err(_) => continue,
                Ok(Ok(Some(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_record(&line) {
                        Ok(reading) => {
                            buffer.write().await.push(reading);
                            stats.accepted += 1;
                        }
                        Err(e) => {
                            tracing::warn!("Skipping malformed record '{}': {}", line.trim(), e);
                            stats.rejected += 1;
                        }
                    }
                }
                Ok(Ok(None)) => {
                    tracing::info!("Device stream closed");
                    break;
                }
                // The bad line is already consumed, so this is a bad record, not a bad link
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::warn!("Skipping undecodable record: {}", e);
                    stats.rejected += 1;
                }
                Ok(Err(e)) => {
                    let err = FeedError::TransientRead(e);
                    tracing::warn!("{}", err);
                    stats.read_errors += 1;
                    tokio::time::sleep(poll_interval).await;
                }
            },
        }
    }

    buffer.write().await.set_connected(false);
    tracing::info!(
        "Live feed stopped: accepted={} rejected={} read_errors={}",
        stats.accepted,
        stats.rejected,
        stats.read_errors
    );
    stats
}
