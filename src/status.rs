//! Background readiness monitoring for the active provider.
//!
//! The monitor periodically probes the provider behind the active agent's
//! selected model, caches the result for cheap synchronous reads, and
//! publishes every refresh to subscribers.

use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigProvider, SelectionGap};
use crate::domain::{ReadinessEvent, ReadinessSnapshot};
use crate::probe::HealthProber;

/// How often the active provider is re-probed.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_BACKLOG: usize = 16;

/// Keeps the readiness snapshot of the active provider up to date.
pub struct StatusMonitor {
    config: Arc<dyn ConfigProvider>,
    prober: HealthProber,
    snapshot: RwLock<ReadinessSnapshot>,
    events: broadcast::Sender<ReadinessEvent>,
    interval: Duration,
}

impl StatusMonitor {
    pub fn new(config: Arc<dyn ConfigProvider>, prober: HealthProber) -> Self {
        let (events, _) = broadcast::channel(EVENT_BACKLOG);
        Self {
            config,
            prober,
            snapshot: RwLock::new(ReadinessSnapshot::default()),
            events,
            interval: REFRESH_INTERVAL,
        }
    }

    #[cfg(test)]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Latest cached snapshot. Never waits on a probe.
    pub fn snapshot(&self) -> ReadinessSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to readiness updates until `cancel` fires.
    pub fn subscribe(&self, cancel: CancellationToken) -> Subscription {
        Subscription {
            receiver: self.events.subscribe(),
            cancel,
        }
    }

    /// Run the refresh loop on a background task: once immediately, then on
    /// every interval tick until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            info!(
                interval_secs = monitor.interval.as_secs(),
                "Provider status monitor started"
            );
            let mut ticker = tokio::time::interval(monitor.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        monitor.refresh(&cancel).await;
                    }
                }
            }
            info!("Provider status monitor stopped");
        })
    }

    /// Recompute the snapshot, replace the cached one and publish it.
    ///
    /// A refresh interrupted by `cancel` leaves the cache untouched and
    /// returns the previous snapshot.
    pub async fn refresh(&self, cancel: &CancellationToken) -> ReadinessSnapshot {
        let snapshot = self.compute_snapshot(cancel).await;
        if cancel.is_cancelled() {
            debug!("Status refresh cancelled; keeping previous snapshot");
            return self.snapshot();
        }
        if !snapshot.ready {
            warn!(
                provider = %snapshot.provider_id,
                detail = %snapshot.detail,
                "Active provider not ready"
            );
        }

        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();

        if self
            .events
            .send(ReadinessEvent::updated(snapshot.clone()))
            .is_err()
        {
            debug!("No status subscribers");
        }
        snapshot
    }

    /// Probe the active provider and build a snapshot.
    ///
    /// Missing configuration yields a not-ready snapshot whose detail names
    /// the missing piece.
    pub async fn compute_snapshot(&self, cancel: &CancellationToken) -> ReadinessSnapshot {
        let mut snapshot = ReadinessSnapshot {
            last_checked: Some(Utc::now()),
            ..Default::default()
        };

        let selected = match self.config.active_model() {
            Ok(selected) => selected,
            Err(gap) => {
                snapshot.detail = gap.to_string();
                return snapshot;
            }
        };
        snapshot.model_id = selected.model.clone();

        let Some(provider) = self.config.provider(&selected.provider) else {
            snapshot.detail = SelectionGap::ProviderNotFound.to_string();
            return snapshot;
        };

        if let Some(model) = provider.model(&selected.model) {
            snapshot.model_name = model.name.clone();
        }
        snapshot.provider_id = provider.id.clone();
        snapshot.provider_name = if provider.name.is_empty() {
            provider.id.clone()
        } else {
            provider.name.clone()
        };
        snapshot.base_url = provider.base_url.clone();
        snapshot.stream_enabled = !provider.disable_stream;

        let result = self.prober.check_health(&provider, cancel).await;
        snapshot.apply(result);
        snapshot
    }
}

/// Stream of readiness events for one subscriber.
pub struct Subscription {
    receiver: broadcast::Receiver<ReadinessEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Next event, or `None` once the subscriber is cancelled or the monitor
    /// is gone. A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<ReadinessEvent> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                event = self.receiver.recv() => match event {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "Status subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }
}
