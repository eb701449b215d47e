//! Background eviction of expired idle connections.
//!
//! # Responsibilities
//! - Periodically close idle connections past the keep-alive timeout
//! - Stop cleanly on shutdown
//!
//! The reaper only frees file descriptors earlier. Correctness never depends
//! on it: `acquire` applies the same policy on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::pool::Pool;

pub struct IdleReaper {
    pool: Arc<Pool>,
    interval: Duration,
}

impl IdleReaper {
    pub fn new(pool: Arc<Pool>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.pool.settings().policy.keep_alive_timeout.is_none() {
            tracing::info!("Idle reaper disabled: no keep-alive timeout configured");
            return;
        }
        if self.interval.is_zero() {
            tracing::warn!("Idle reaper disabled: zero interval");
            return;
        }

        tracing::info!(interval = ?self.interval, "Idle reaper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.pool.is_closed() {
                        break;
                    }
                    let reaped = self.pool.reap_idle();
                    if reaped > 0 {
                        tracing::debug!(reaped, "Reaped expired idle connections");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Idle reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
