//! Periodic background loops owned by the manager

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Keeps every spawned loop so `shutdown` can stop and await them
pub struct TaskRegistry {
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    loops: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            loops: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `tick` every `period` until the key is canceled or the registry
    /// shuts down. The first tick fires after one period.
    ///
    /// Returns `false` when a loop with this key is already running.
    pub fn spawn_interval<F, Fut>(&self, key: impl Into<String>, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        {
            let mut loops = self.loops.lock();
            if loops.contains_key(&key) {
                debug!(task = %key, "periodic task already running");
                return false;
            }
            loops.insert(key.clone(), cancel_tx);
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let loops = self.loops.clone();
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => tick().await,
                }
            }

            loops.lock().remove(&key);
            debug!(task = %key, "periodic task stopped");
        });

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        true
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.loops.lock().contains_key(key)
    }

    /// Stop one loop; returns whether it was running
    pub fn cancel(&self, key: &str) -> bool {
        match self.loops.lock().get(key) {
            Some(cancel_tx) => cancel_tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Stop every loop and wait for them to finish
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "periodic task panicked");
            }
        }
        self.loops.lock().clear();
        info!(tasks = count, "background tasks stopped");
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
