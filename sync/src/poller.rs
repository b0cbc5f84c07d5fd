//! Background refresh of the volatile dashboard fields.
//!
//! The poller re-fetches risk, health and burst state on a fixed interval
//! while the host is visible, bypassing the snapshot cache, and hands each
//! successful batch to the consumer as a [`VolatileUpdate`]. Failed ticks are
//! logged and dropped; the consumer's last good values stay on screen.

use crate::aggregator::Aggregator;
use crate::sequencer::RequestSlot;
use crate::snapshot::VolatileUpdate;
use riskboard_async_utils::{CancellationToken, OrCancelExt};
use riskboard_protocol::SelectionKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Foreground/background state of the host surface.
#[derive(Debug, Clone)]
pub struct HostVisibility {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for HostVisibility {
    fn default() -> Self {
        Self::new(true)
    }
}

impl HostVisibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_visible(&self, visible: bool) {
        self.tx.send_replace(visible);
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Result of one poll tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// At least one volatile field was re-fetched successfully.
    Updated(VolatileUpdate),
    /// Every request failed; keep showing the last good values.
    Unchanged,
    /// A newer tick or a retarget took over while this one was in flight.
    Superseded,
    Cancelled,
}

/// Run one poll tick for `key` under `slot`.
pub async fn poll_tick(
    aggregator: &Aggregator,
    key: &SelectionKey,
    slot: &RequestSlot,
    token: &CancellationToken,
) -> PollOutcome {
    let ticket = slot.begin();
    let Some(update) = aggregator.fetch_volatile(key, token).await else {
        return PollOutcome::Cancelled;
    };
    if !slot.is_current(&ticket) {
        tracing::debug!(%key, sequence = ticket.sequence(), "discarding superseded poll");
        return PollOutcome::Superseded;
    }
    if update.is_empty() {
        tracing::debug!(%key, "poll tick produced no fresh values");
        return PollOutcome::Unchanged;
    }
    PollOutcome::Updated(update)
}

/// Spawns poll loops.
pub struct Poller;

impl Poller {
    /// Start polling `key` every `interval`.
    ///
    /// Must be called inside a tokio runtime. The first tick fires one
    /// interval after spawning; the initial resolution already covers "now".
    pub fn spawn(
        aggregator: Arc<Aggregator>,
        key: SelectionKey,
        interval: Duration,
        visibility: HostVisibility,
        slot: Arc<RequestSlot>,
    ) -> PollerHandle {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let mut handle = PollerHandle {
            aggregator,
            interval,
            visibility,
            slot,
            key: key.clone(),
            updates_tx,
            updates_rx,
            task: None,
        };
        handle.start(key);
        handle
    }
}

struct RunningTask {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Owner of a running poll loop. Dropping it stops the loop.
pub struct PollerHandle {
    aggregator: Arc<Aggregator>,
    interval: Duration,
    visibility: HostVisibility,
    slot: Arc<RequestSlot>,
    key: SelectionKey,
    updates_tx: mpsc::UnboundedSender<VolatileUpdate>,
    updates_rx: mpsc::UnboundedReceiver<VolatileUpdate>,
    task: Option<RunningTask>,
}

impl PollerHandle {
    pub fn key(&self) -> &SelectionKey {
        &self.key
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.join.is_finished())
    }

    /// Next update, waiting for one if necessary.
    pub async fn recv(&mut self) -> Option<VolatileUpdate> {
        self.updates_rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<VolatileUpdate> {
        self.updates_rx.try_recv().ok()
    }

    /// Stop polling the current key and start polling `key`.
    pub fn retarget(&mut self, key: SelectionKey) {
        self.stop();
        while self.updates_rx.try_recv().is_ok() {}
        self.key = key.clone();
        self.start(key);
    }

    /// Stop the loop. In-flight requests are cancelled and late results
    /// are discarded.
    pub fn stop(&mut self) {
        self.slot.invalidate();
        if let Some(task) = self.task.take() {
            task.token.cancel();
            task.join.abort();
            tracing::debug!(key = %self.key, "poller stopped");
        }
    }

    fn start(&mut self, key: SelectionKey) {
        let token = CancellationToken::new();
        let join = tokio::spawn(run(
            Arc::clone(&self.aggregator),
            key,
            self.interval,
            self.visibility.subscribe(),
            Arc::clone(&self.slot),
            self.updates_tx.clone(),
            token.clone(),
        ));
        tracing::debug!(key = %self.key, interval_secs = self.interval.as_secs(), "poller started");
        self.task = Some(RunningTask { token, join });
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    aggregator: Arc<Aggregator>,
    key: SelectionKey,
    interval: Duration,
    visibility: watch::Receiver<bool>,
    slot: Arc<RequestSlot>,
    updates: mpsc::UnboundedSender<VolatileUpdate>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        if ticker.tick().or_cancel(&token).await.is_err() {
            break;
        }
        if !*visibility.borrow() {
            tracing::trace!(%key, "host hidden, skipping poll tick");
            continue;
        }
        match poll_tick(&aggregator, &key, &slot, &token).await {
            PollOutcome::Updated(update) => {
                if updates.send(update).is_err() {
                    break;
                }
            }
            PollOutcome::Unchanged | PollOutcome::Superseded => {}
            PollOutcome::Cancelled => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::DashboardPlan;
    use crate::cache::SnapshotCache;
    use crate::fallback::FallbackPolicy;
    use crate::fetch::{FetchFailure, Transport};
    use crate::sequencer::SlotId;
    use crate::snapshot::{Field, Snapshot};
    use crate::test_support::{Scripted, ScriptedTransport};
    use pretty_assertions::assert_eq;
    use riskboard_protocol::{RiskMeta, RiskMetric};
    use serde_json::json;

    const MINUTE: Duration = Duration::from_secs(60);

    fn scripted() -> Arc<ScriptedTransport> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "/api/risk-score",
            json!({ "meta": { "totalCount": 120 }, "value": 43.0 }),
        );
        transport.respond("/api/health", json!({ "ok": true, "recentCount": 7 }));
        transport.respond("/api/burst-events", json!({ "items": [] }));
        transport
    }

    fn aggregator(transport: &Arc<ScriptedTransport>) -> Arc<Aggregator> {
        Arc::new(Aggregator::new(
            Arc::clone(transport) as Arc<dyn Transport>,
            Arc::new(SnapshotCache::default()),
            DashboardPlan::default(),
            FallbackPolicy::disabled(),
        ))
    }

    fn poll_slot() -> Arc<RequestSlot> {
        Arc::new(RequestSlot::new(SlotId::Poll))
    }

    fn snapshot_with_value(value: f64) -> Snapshot {
        let mut snapshot = Snapshot::empty(SelectionKey::from("A"));
        snapshot.risk = Field::Live(RiskMetric {
            meta: RiskMeta {
                total_count: Some(120),
                ..RiskMeta::default()
            },
            value: Some(value),
            ..RiskMetric::default()
        });
        snapshot
    }

    #[tokio::test]
    async fn failing_tick_leaves_rendered_value_untouched() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("/api/risk-score", FetchFailure::http(500));
        transport.fail("/api/health", FetchFailure::Timeout);
        transport.fail("/api/burst-events", FetchFailure::Network("reset".into()));
        let aggregator = aggregator(&transport);
        let rendered = snapshot_with_value(42.0);

        let outcome = poll_tick(
            &aggregator,
            &SelectionKey::from("A"),
            &poll_slot(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, PollOutcome::Unchanged);
        assert_eq!(rendered.risk.value().and_then(|r| r.value), Some(42.0));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn successful_tick_merges_volatile_fields_only() {
        let transport = scripted();
        let aggregator = aggregator(&transport);
        let mut rendered = snapshot_with_value(42.0);
        rendered.timeseries = Field::Empty;

        let outcome = poll_tick(
            &aggregator,
            &SelectionKey::from("A"),
            &poll_slot(),
            &CancellationToken::new(),
        )
        .await;

        let PollOutcome::Updated(update) = outcome else {
            panic!("expected update, got {outcome:?}");
        };
        let merged = rendered.merge_volatile(&update);
        assert_eq!(merged.risk.value().and_then(|r| r.value), Some(43.0));
        assert!(merged.health.is_live());
        assert_eq!(merged.bursts, Field::Empty);
        assert_eq!(merged.timeseries, Field::Empty);
        assert!(aggregator.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval_and_skips_hidden_ticks() {
        let transport = scripted();
        let visibility = HostVisibility::default();
        let mut handle = Poller::spawn(
            aggregator(&transport),
            SelectionKey::from("A"),
            MINUTE,
            visibility.clone(),
            poll_slot(),
        );

        let first = handle.recv().await.expect("first update");
        assert_eq!(first.key, SelectionKey::from("A"));
        assert_eq!(transport.call_count(), 3);

        visibility.set_visible(false);
        tokio::time::sleep(MINUTE * 3).await;
        assert_eq!(transport.call_count(), 3);
        assert!(handle.try_recv().is_none());

        visibility.set_visible(true);
        let resumed = handle.recv().await.expect("update after becoming visible");
        assert_eq!(resumed.key, SelectionKey::from("A"));
        assert_eq!(transport.call_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn retarget_switches_key_and_discards_old_loop() {
        let transport = scripted();
        transport.respond(
            "/api/risk-score?ip=B",
            json!({ "meta": { "totalCount": 5 }, "value": 7.0 }),
        );
        let mut handle = Poller::spawn(
            aggregator(&transport),
            SelectionKey::from("A"),
            MINUTE,
            HostVisibility::default(),
            poll_slot(),
        );

        handle.retarget(SelectionKey::from("B"));
        let update = handle.recv().await.expect("update for B");

        assert_eq!(update.key, SelectionKey::from("B"));
        assert_eq!(update.risk.and_then(|r| r.value), Some(7.0));
        assert_eq!(handle.key(), &SelectionKey::from("B"));
        assert!(transport.calls().iter().all(|c| c.query_value("ip") != Some("A")));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_in_flight_tick() {
        let transport = scripted();
        transport.set_default(
            "/api/risk-score",
            Scripted::ok(json!({ "meta": { "totalCount": 1 } })).after(MINUTE),
        );
        let mut handle = Poller::spawn(
            aggregator(&transport),
            SelectionKey::from("A"),
            MINUTE,
            HostVisibility::default(),
            poll_slot(),
        );

        tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;
        assert!(handle.is_running());
        handle.stop();
        tokio::time::sleep(MINUTE * 3).await;

        assert!(!handle.is_running());
        assert!(handle.try_recv().is_none());
        assert_eq!(transport.calls_to("/api/risk-score"), 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_task() {
        let transport = scripted();
        let handle = Poller::spawn(
            aggregator(&transport),
            SelectionKey::from("A"),
            MINUTE,
            HostVisibility::default(),
            poll_slot(),
        );
        let token = handle
            .task
            .as_ref()
            .map(|t| t.token.clone())
            .expect("running task");

        drop(handle);

        assert!(token.is_cancelled());
    }
}
