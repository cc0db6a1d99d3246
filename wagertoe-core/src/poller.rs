use crate::sync::{PassOutcome, Reconciler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Fixed-interval driver for [`Reconciler::poll`]. One driver owns exactly
/// one timer task; stopping or dropping the driver ends it.
pub struct PollingDriver {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollingDriver {
    pub fn start(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; callers run their own pass on start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match reconciler.poll().await {
                            PassOutcome::Failed => {
                                tracing::debug!("Poll failed, retrying next tick")
                            }
                            PassOutcome::Applied { changed: true } => {
                                tracing::debug!("Poll applied new state")
                            }
                            _ => {}
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Polling driver stopped");
        });

        tracing::info!("Polling ledger every {:?}", interval);
        Self {
            shutdown,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Signal the timer task and wait for it to exit. A pass already in
    /// progress finishes first.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Polling task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollingDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
