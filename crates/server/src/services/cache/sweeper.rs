//! Periodically drops expired feed cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{sweep_expired, Entries};

enum Message {
    Shutdown,
}

/// Handle for communicating with the cache sweeper
#[derive(Clone)]
pub struct CacheSweeperHandle {
    sender: mpsc::Sender<Message>,
}

impl CacheSweeperHandle {
    /// Signal the sweeper to stop
    pub async fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown).await;
    }
}

struct CacheSweeper {
    entries: Arc<Entries>,
    interval: Duration,
    receiver: mpsc::Receiver<Message>,
}

impl CacheSweeper {
    async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip first tick (immediate)
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.execute();
                }
                msg = self.receiver.recv() => {
                    match msg {
                        Some(Message::Shutdown) | None => {
                            tracing::info!("Cache sweeper stopped");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn execute(&self) {
        let removed = sweep_expired(&self.entries);
        if removed > 0 {
            tracing::info!("Cache sweep completed: {} expired feeds removed", removed);
        } else {
            tracing::debug!("Cache sweep completed: nothing expired");
        }
    }
}

/// Create and start the sweeper for the given entries
pub(super) fn create_cache_sweeper(entries: Arc<Entries>, interval: Duration) -> CacheSweeperHandle {
    let (sender, receiver) = mpsc::channel(8);

    let sweeper = CacheSweeper {
        entries,
        interval,
        receiver,
    };
    tokio::spawn(sweeper.run());

    CacheSweeperHandle { sender }
}
