//! Single-task event loop around a [`Blotter`].
//!
//! All inbound events are queued as [`BlotterCommand`]s and applied on one
//! tokio task, together with the sweep timer, the optional batch flush timer
//! and the settlement signal stream. The blotter itself is never shared, so
//! it needs no locking.

use crate::blotter::change_event::{ChangeEvent, ChangeListener};
use crate::blotter::config::BlotterConfig;
use crate::blotter::engine::Blotter;
use crate::blotter::error::BlotterError;
use crate::blotter::settlement::{SettlementContainer, SettlementSignal};
use crate::blotter::types::{QuoteReply, QuoteRequest};
use crate::blotter::visibility::LimitTarget;
use crate::utils::current_time_millis;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{info, trace, warn};

/// One inbound event for the blotter.
#[derive(Debug)]
pub enum BlotterCommand {
    NewQuoteRequest(QuoteRequest),
    QuoteReplied(QuoteReply),
    QuoteNotifCancelled {
        id: String,
    },
    QuoteReqCancelled {
        id: String,
        by_user: bool,
    },
    QuoteRejected {
        id: String,
        reason: String,
    },
    BestQuotePrice {
        id: String,
        price: f64,
        own: bool,
    },
    SecurityPriceUpdate {
        security: String,
        bid: Option<f64>,
        offer: Option<f64>,
    },
    SettlementAdded(Arc<dyn SettlementContainer>),
    SetGroupLimit {
        target: LimitTarget,
        limit: i32,
    },
    SetPriceUpdateInterval(u64),
    SetShowQuotedFilter(bool),
    ScheduleRemoval {
        id: String,
    },
    /// Gateway connection lost: drop everything.
    Clear,
}

impl Blotter {
    /// Applies one command and returns the events it produced.
    pub fn dispatch(&mut self, command: BlotterCommand) -> Vec<ChangeEvent> {
        match command {
            BlotterCommand::NewQuoteRequest(request) => self.on_new_quote_request(request),
            BlotterCommand::QuoteReplied(reply) => self.on_quote_replied(&reply),
            BlotterCommand::QuoteNotifCancelled { id } => self.on_quote_notif_cancelled(&id),
            BlotterCommand::QuoteReqCancelled { id, by_user } => {
                self.on_quote_req_cancelled(&id, by_user)
            }
            BlotterCommand::QuoteRejected { id, reason } => self.on_quote_rejected(&id, &reason),
            BlotterCommand::BestQuotePrice { id, price, own } => {
                self.on_best_quote_price(&id, price, own)
            }
            BlotterCommand::SecurityPriceUpdate {
                security,
                bid,
                offer,
            } => self.on_security_price_update(&security, bid, offer),
            BlotterCommand::SettlementAdded(container) => self.on_settlement_added(container),
            BlotterCommand::SetGroupLimit { target, limit } => self.set_group_limit(&target, limit),
            BlotterCommand::SetPriceUpdateInterval(interval_ms) => {
                self.set_price_update_interval(interval_ms)
            }
            BlotterCommand::SetShowQuotedFilter(show_quoted) => {
                self.set_show_quoted_filter(show_quoted)
            }
            BlotterCommand::ScheduleRemoval { id } => {
                self.schedule_removal(&id);
                Vec::new()
            }
            BlotterCommand::Clear => self.clear(),
        }
    }
}

/// Cloneable sender side of a running [`BlotterDriver`].
#[derive(Debug, Clone)]
pub struct BlotterHandle {
    sender: mpsc::UnboundedSender<BlotterCommand>,
}

impl BlotterHandle {
    /// Queues a command for the driver task.
    ///
    /// # Errors
    /// Returns [`BlotterError::DriverStopped`] once the driver has exited.
    pub fn send(&self, command: BlotterCommand) -> Result<(), BlotterError> {
        self.sender
            .send(command)
            .map_err(|_| BlotterError::DriverStopped)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn new_quote_request(&self, request: QuoteRequest) -> Result<(), BlotterError> {
        self.send(BlotterCommand::NewQuoteRequest(request))
    }

    pub fn quote_replied(&self, reply: QuoteReply) -> Result<(), BlotterError> {
        self.send(BlotterCommand::QuoteReplied(reply))
    }

    pub fn quote_notif_cancelled(&self, id: impl Into<String>) -> Result<(), BlotterError> {
        self.send(BlotterCommand::QuoteNotifCancelled { id: id.into() })
    }

    pub fn quote_req_cancelled(
        &self,
        id: impl Into<String>,
        by_user: bool,
    ) -> Result<(), BlotterError> {
        self.send(BlotterCommand::QuoteReqCancelled {
            id: id.into(),
            by_user,
        })
    }

    pub fn quote_rejected(
        &self,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), BlotterError> {
        self.send(BlotterCommand::QuoteRejected {
            id: id.into(),
            reason: reason.into(),
        })
    }

    pub fn best_quote_price(
        &self,
        id: impl Into<String>,
        price: f64,
        own: bool,
    ) -> Result<(), BlotterError> {
        self.send(BlotterCommand::BestQuotePrice {
            id: id.into(),
            price,
            own,
        })
    }

    pub fn security_price_update(
        &self,
        security: impl Into<String>,
        bid: Option<f64>,
        offer: Option<f64>,
    ) -> Result<(), BlotterError> {
        self.send(BlotterCommand::SecurityPriceUpdate {
            security: security.into(),
            bid,
            offer,
        })
    }

    pub fn settlement_added(
        &self,
        container: Arc<dyn SettlementContainer>,
    ) -> Result<(), BlotterError> {
        self.send(BlotterCommand::SettlementAdded(container))
    }

    pub fn set_group_limit(&self, target: LimitTarget, limit: i32) -> Result<(), BlotterError> {
        self.send(BlotterCommand::SetGroupLimit { target, limit })
    }

    pub fn set_price_update_interval(&self, interval_ms: u64) -> Result<(), BlotterError> {
        self.send(BlotterCommand::SetPriceUpdateInterval(interval_ms))
    }

    pub fn set_show_quoted_filter(&self, show_quoted: bool) -> Result<(), BlotterError> {
        self.send(BlotterCommand::SetShowQuotedFilter(show_quoted))
    }

    pub fn schedule_removal(&self, id: impl Into<String>) -> Result<(), BlotterError> {
        self.send(BlotterCommand::ScheduleRemoval { id: id.into() })
    }

    pub fn clear(&self) -> Result<(), BlotterError> {
        self.send(BlotterCommand::Clear)
    }
}

/// Owns a [`Blotter`] and drives it from a single tokio task.
pub struct BlotterDriver {
    blotter: Blotter,
    commands: mpsc::UnboundedReceiver<BlotterCommand>,
    listener: Option<ChangeListener>,
}

impl BlotterDriver {
    pub fn new(config: BlotterConfig) -> (Self, BlotterHandle) {
        Self::with_blotter(Blotter::new(config))
    }

    /// Drives an existing blotter, keeping its tree and caches.
    pub fn with_blotter(blotter: Blotter) -> (Self, BlotterHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let driver = Self {
            blotter,
            commands,
            listener: None,
        };
        (driver, BlotterHandle { sender })
    }

    /// Sets the callback receiving every emitted event.
    pub fn with_listener(mut self, listener: ChangeListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Runs the driver on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<Blotter> {
        tokio::spawn(self.run())
    }

    /// Processes events until every [`BlotterHandle`] is dropped, then
    /// returns the blotter.
    pub async fn run(mut self) -> Blotter {
        info!("Blotter driver started");

        let mut signals = self.blotter.take_settlement_receiver();
        let mut sweep = time::interval(Duration::from_millis(
            self.blotter.sweep_interval_ms().max(1),
        ));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut batch = batch_interval(self.blotter.price_update_interval_ms());

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    trace!("Dispatching {:?}", command);
                    let reschedule = matches!(command, BlotterCommand::SetPriceUpdateInterval(_));
                    let events = self.blotter.dispatch(command);
                    self.emit(&events);
                    if reschedule {
                        batch = batch_interval(self.blotter.price_update_interval_ms());
                    }
                }
                Some(signal) = next_signal(&mut signals) => {
                    let events = self.blotter.on_settlement_signal(signal);
                    self.emit(&events);
                }
                _ = sweep.tick() => {
                    let events = self.blotter.tick(current_time_millis());
                    self.emit(&events);
                }
                _ = next_batch(&mut batch) => {
                    let events = self.blotter.flush_price_updates();
                    self.emit(&events);
                }
            }
        }

        if let Some(receiver) = signals {
            self.blotter.restore_settlement_receiver(receiver);
        }
        info!("Blotter driver stopped");
        self.blotter
    }

    fn emit(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        match &self.listener {
            Some(listener) => {
                for event in events {
                    listener(event);
                }
            }
            None => warn!("No change listener, dropped {} events", events.len()),
        }
    }
}

impl std::fmt::Debug for BlotterDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlotterDriver")
            .field("blotter", &self.blotter)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

fn batch_interval(interval_ms: u64) -> Option<Interval> {
    if interval_ms == 0 {
        return None;
    }
    let mut interval = time::interval(Duration::from_millis(interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn next_signal(
    receiver: &mut Option<mpsc::UnboundedReceiver<SettlementSignal>>,
) -> Option<SettlementSignal> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => future::pending().await,
    }
}

async fn next_batch(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
