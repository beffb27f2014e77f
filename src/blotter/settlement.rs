//! Settlement Lifecycle Adapter.
//!
//! Settlement containers are owned elsewhere. The adapter shows each one as
//! an entry of the reserved settlements Market, and hands the container a
//! [`SettlementNotifier`] through which it reports its lifecycle. Signals
//! travel over a channel, so a terminal signal never mutates the tree from
//! inside the container's own call stack; it only schedules the entry for
//! the next sweep.

use crate::blotter::change_event::{ChangeEvent, Columns};
use crate::blotter::engine::Blotter;
use crate::blotter::entry::Rfq;
use crate::blotter::tree::EntryHandle;
use crate::blotter::types::{AssetType, Column, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// An in-progress trade settlement owned outside the blotter.
pub trait SettlementContainer: Send + Sync {
    fn id(&self) -> &str;
    fn security(&self) -> &str;
    fn product(&self) -> &str;
    fn side(&self) -> Side;
    fn quantity(&self) -> f64;
    fn price(&self) -> f64;
    fn asset_type(&self) -> AssetType;
    /// Remaining settlement countdown in milliseconds.
    fn time_left_ms(&self) -> i64;
    /// Called once the blotter stops tracking the container.
    fn deactivate(&self);
    /// Receives the notifier the container reports its lifecycle through.
    fn bind(&self, notifier: SettlementNotifier);
}

impl fmt::Debug for dyn SettlementContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementContainer")
            .field("id", &self.id())
            .field("security", &self.security())
            .field("time_left_ms", &self.time_left_ms())
            .finish()
    }
}

/// Lifecycle signal raised by a settlement container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementEvent {
    Failed,
    Completed,
    TimerExpired,
    /// The settlement countdown started with the given total.
    TimerStarted { duration_ms: i64 },
}

impl SettlementEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SettlementEvent::TimerStarted { .. })
    }
}

/// A signal tagged with the entry it was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementSignal {
    pub id: String,
    pub entry: EntryHandle,
    pub event: SettlementEvent,
}

/// Shared flag that silences a binding once its entry is gone.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Sending half handed to a settlement container.
#[derive(Debug, Clone)]
pub struct SettlementNotifier {
    id: String,
    entry: EntryHandle,
    token: CancellationToken,
    sender: mpsc::UnboundedSender<SettlementSignal>,
}

impl SettlementNotifier {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn failed(&self) {
        self.send(SettlementEvent::Failed);
    }

    pub fn completed(&self) {
        self.send(SettlementEvent::Completed);
    }

    pub fn timer_expired(&self) {
        self.send(SettlementEvent::TimerExpired);
    }

    pub fn timer_started(&self, duration_ms: i64) {
        self.send(SettlementEvent::TimerStarted { duration_ms });
    }

    fn send(&self, event: SettlementEvent) {
        if self.token.is_cancelled() {
            trace!("Dropping {:?} for released settlement {}", event, self.id);
            return;
        }
        let signal = SettlementSignal {
            id: self.id.clone(),
            entry: self.entry,
            event,
        };
        if self.sender.send(signal).is_err() {
            debug!("Settlement signal for {} has no receiver", self.id);
        }
    }
}

/// Completed and failed settlement totals, shown on the bucket row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettlementCounters {
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug)]
struct ActiveSettlement {
    container: Arc<dyn SettlementContainer>,
    entry: EntryHandle,
    token: CancellationToken,
}

impl ActiveSettlement {
    fn release(self) {
        self.token.cancel();
        self.container.deactivate();
    }
}

#[derive(Debug)]
pub struct SettlementAdapter {
    active: HashMap<String, ActiveSettlement>,
    counters: SettlementCounters,
    sender: mpsc::UnboundedSender<SettlementSignal>,
    receiver: Option<mpsc::UnboundedReceiver<SettlementSignal>>,
}

impl Default for SettlementAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SettlementAdapter {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            active: HashMap::new(),
            counters: SettlementCounters::default(),
            sender,
            receiver: Some(receiver),
        }
    }

    /// Hands the signal stream to an event loop. Afterwards pending signals
    /// are no longer drained by [`Blotter::tick`].
    pub fn take_signal_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SettlementSignal>> {
        self.receiver.take()
    }

    pub(super) fn restore_signal_receiver(
        &mut self,
        receiver: mpsc::UnboundedReceiver<SettlementSignal>,
    ) {
        self.receiver = Some(receiver);
    }

    pub(super) fn drain_pending_signals(&mut self) -> Vec<SettlementSignal> {
        let mut signals = Vec::new();
        if let Some(receiver) = self.receiver.as_mut() {
            while let Ok(signal) = receiver.try_recv() {
                signals.push(signal);
            }
        }
        signals
    }

    pub fn register(&mut self, container: Arc<dyn SettlementContainer>, entry: EntryHandle) {
        let id = container.id().to_string();
        let token = CancellationToken::new();
        container.bind(SettlementNotifier {
            id: id.clone(),
            entry,
            token: token.clone(),
            sender: self.sender.clone(),
        });
        if let Some(previous) = self.active.insert(
            id,
            ActiveSettlement {
                container,
                entry,
                token,
            },
        ) {
            previous.release();
        }
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Whether `entry` is the binding currently tracked for `id`.
    pub fn is_bound(&self, id: &str, entry: EntryHandle) -> bool {
        self.active.get(id).is_some_and(|active| active.entry == entry)
    }

    /// Stops tracking a settlement after a terminal signal and counts it.
    ///
    /// Timer expiry counts as a failure. Returns `false` for stale ids.
    pub fn terminate(&mut self, id: &str, entry: EntryHandle, event: SettlementEvent) -> bool {
        if !event.is_terminal() || !self.is_bound(id, entry) {
            return false;
        }
        match event {
            SettlementEvent::Completed => self.counters.completed += 1,
            _ => self.counters.failed += 1,
        }
        self.release(id)
    }

    /// Stops tracking a settlement without counting an outcome.
    pub fn release(&mut self, id: &str) -> bool {
        match self.active.remove(id) {
            Some(active) => {
                active.release();
                true
            }
            None => false,
        }
    }

    pub fn time_left_ms(&self, id: &str) -> Option<i64> {
        self.active
            .get(id)
            .map(|active| active.container.time_left_ms())
    }

    pub fn counters(&self) -> SettlementCounters {
        self.counters
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Releases every container, resets the counters and drops queued signals.
    pub fn clear(&mut self) {
        for (_, active) in self.active.drain() {
            active.release();
        }
        self.counters = SettlementCounters::default();
        self.drain_pending_signals();
    }
}

impl Blotter {
    /// Starts tracking an externally owned settlement.
    pub fn on_settlement_added(
        &mut self,
        container: Arc<dyn SettlementContainer>,
    ) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        let id = container.id();
        if self.tree.find_by_id(id).is_some() || self.settlements.is_active(id) {
            debug!("Settlement {} already tracked", id);
            return events;
        }

        let rfq = Rfq::from_settlement(container.as_ref());
        let spec = self.config.settlements_spec();
        let handle = self.tree.insert_settlement(&spec, rfq, &mut events);
        self.settlements.register(container, handle);
        events
    }

    /// Handles a signal delivered by a [`SettlementNotifier`].
    pub fn on_settlement_signal(&mut self, signal: SettlementSignal) -> Vec<ChangeEvent> {
        let SettlementSignal { id, entry, event } = signal;
        if !self.settlements.is_bound(&id, entry) {
            debug!("Stale settlement signal {:?} for {}", event, id);
            return Vec::new();
        }

        match event {
            SettlementEvent::TimerStarted { duration_ms } => {
                let Some(node) = self.tree.entry_mut(entry) else {
                    return Vec::new();
                };
                node.rfq.status.timeout_ms = duration_ms;
                self.tree
                    .entry_position(entry)
                    .map(|(scope, row)| ChangeEvent::updated(scope, row, Column::Status))
                    .into_iter()
                    .collect()
            }
            terminal => self.schedule_settlement_removal(&id, entry, terminal),
        }
    }

    fn schedule_settlement_removal(
        &mut self,
        id: &str,
        entry: EntryHandle,
        event: SettlementEvent,
    ) -> Vec<ChangeEvent> {
        if !self.settlements.terminate(id, entry, event) {
            return Vec::new();
        }
        self.sweeper.schedule(id);
        trace!("Settlement {} ended with {:?}, removal deferred", id, event);

        let bucket = self
            .tree
            .find_by_market_name(&self.config.settlements_market_name);
        bucket
            .and_then(|market| self.tree.market_position(market))
            .map(|(scope, row)| {
                ChangeEvent::updated(scope, row, Columns::span(Column::Product, Column::Side))
            })
            .into_iter()
            .collect()
    }

    pub fn settlement_counters(&self) -> SettlementCounters {
        self.settlements.counters()
    }

    /// Takes the settlement signal stream for an external event loop.
    pub fn take_settlement_receiver(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<SettlementSignal>> {
        self.settlements.take_signal_receiver()
    }

    /// Hands back a stream taken by [`Blotter::take_settlement_receiver`].
    pub fn restore_settlement_receiver(
        &mut self,
        receiver: mpsc::UnboundedReceiver<SettlementSignal>,
    ) {
        self.settlements.restore_signal_receiver(receiver);
    }
}
