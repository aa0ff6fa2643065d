//! Background worker that expires idle call sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::common::config::SessionConfig;
use crate::session::store::SessionStore;

/// Background sweeper for idle sessions.
pub struct SessionSweeper {
    store: Arc<SessionStore>,
    interval: Duration,
    idle_threshold: Duration,
    shutdown: Arc<Notify>,
}

impl SessionSweeper {
    /// Create a sweeper using the session settings.
    #[must_use]
    pub fn new(store: Arc<SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            interval: config.sweep_interval(),
            idle_threshold: config.idle_timeout(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a shutdown notifier to stop the sweeper.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the sweeper as a tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run a single sweep now.
    pub fn sweep_once(&self) -> usize {
        self.store.sweep(Utc::now(), self.idle_threshold)
    }

    async fn run(&self) {
        info!(interval = ?self.interval, idle = ?self.idle_threshold, "Starting session sweeper");

        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {
                    let removed = self.sweep_once();
                    if removed > 0 {
                        info!(removed, remaining = self.store.len(), "Swept idle sessions");
                    } else {
                        debug!("Session sweep found nothing idle");
                    }
                }
                () = self.shutdown.notified() => {
                    info!("Session sweeper shutting down");
                    break;
                }
            }
        }
    }
}
