//! Subscriber registry and the periodic stats broadcast loop.
//!
//! The loop is lazy: spawned when the first subscriber registers, and it
//! winds itself down once it observes an empty registry. At most one loop
//! task exists at any time; `running` is only ever cleared by the loop
//! itself, under the same lock `register` takes, so a registration racing a
//! wind-down either sees the loop still running or starts a fresh one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::metrics::collect_stats;
use crate::state::SharedSystem;
use crate::types::StreamMessage;

/// Rest between cycles, measured from end of one to start of the next.
pub const BROADCAST_PERIOD: Duration = Duration::from_millis(1000);

pub type SubscriberTx = UnboundedSender<Message>;

struct Registry {
    subscribers: HashMap<u64, SubscriberTx>,
    running: bool,
    task: Option<JoinHandle<()>>,
}

pub struct Broadcaster {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    sys: SharedSystem,
}

impl Broadcaster {
    pub fn new(sys: SharedSystem) -> Self {
        Self {
            registry: Mutex::new(Registry {
                subscribers: HashMap::new(),
                running: false,
                task: None,
            }),
            next_id: AtomicU64::new(1),
            sys,
        }
    }

    /// Add a subscriber; starts the broadcast loop if it is not running.
    /// Returns the id to pass back to [`unregister`](Self::unregister).
    pub async fn register(self: &Arc<Self>, tx: SubscriberTx) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut reg = self.registry.lock().await;
        reg.subscribers.insert(id, tx);
        debug!(id, total = reg.subscribers.len(), "subscriber registered");
        if !reg.running {
            reg.running = true;
            reg.task = Some(tokio::spawn(Arc::clone(self).run()));
        }
        id
    }

    /// Remove a subscriber. A no-op if the loop already pruned it.
    pub async fn unregister(&self, id: u64) {
        let mut reg = self.registry.lock().await;
        if reg.subscribers.remove(&id).is_some() {
            debug!(id, total = reg.subscribers.len(), "subscriber unregistered");
        }
        // The loop notices emptiness on its next pass and stops itself.
    }

    pub async fn is_running(&self) -> bool {
        self.registry.lock().await.running
    }

    pub async fn subscriber_count(&self) -> usize {
        self.registry.lock().await.subscribers.len()
    }

    /// Stop the loop and drop all subscribers. Used at process shutdown so
    /// the task can be joined instead of orphaned.
    pub async fn shutdown(&self) {
        let task = {
            let mut reg = self.registry.lock().await;
            reg.subscribers.clear();
            reg.running = false;
            reg.task.take()
        };
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        debug!("broadcaster shut down");
    }

    async fn run(self: Arc<Self>) {
        debug!("broadcast loop started");
        loop {
            {
                let mut reg = self.registry.lock().await;
                if reg.subscribers.is_empty() {
                    reg.running = false;
                    reg.task = None;
                    break;
                }
            }
            if let Err(e) = self.cycle().await {
                warn!(error = %e, "broadcast cycle failed; retrying next period");
            }
            sleep(BROADCAST_PERIOD).await;
        }
        debug!("broadcast loop stopped");
    }

    /// One cycle: sample, serialize once, deliver to every subscriber, prune
    /// the ones whose session ended mid-flight.
    async fn cycle(&self) -> anyhow::Result<()> {
        let stats = collect_stats(&self.sys).await;
        let json = serde_json::to_string(&StreamMessage::stats(stats))?;

        let targets: Vec<(u64, SubscriberTx)> = {
            let reg = self.registry.lock().await;
            reg.subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut dropped = Vec::new();
        for (id, tx) in targets {
            if tx.send(Message::Text(json.clone())).is_err() {
                dropped.push(id);
            }
        }

        if !dropped.is_empty() {
            let mut reg = self.registry.lock().await;
            for id in &dropped {
                reg.subscribers.remove(id);
            }
            debug!(
                pruned = dropped.len(),
                total = reg.subscribers.len(),
                "pruned dead subscribers"
            );
        }
        Ok(())
    }
}
