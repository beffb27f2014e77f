//! Update Batcher: coalesces price-driven notifications between flushes.
//!
//! With a zero interval every update is applied on arrival. Otherwise updates
//! are merged per security (market data) or per request (best quotes) and a
//! flush emits one bounding [`ChangeEvent::Updated`] per parent scope.

use crate::blotter::change_event::{CellRange, ChangeEvent, merge_ranges};
use crate::blotter::engine::Blotter;
use std::collections::BTreeMap;
use std::mem;
use tracing::trace;

/// Market-data fields received since the last flush.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendingPrice {
    pub bid: Option<f64>,
    pub offer: Option<f64>,
}

impl PendingPrice {
    fn merge(&mut self, bid: Option<f64>, offer: Option<f64>) {
        if bid.is_some() {
            self.bid = bid;
        }
        if offer.is_some() {
            self.offer = offer;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingBestQuote {
    pub price: f64,
    pub own: bool,
}

#[derive(Debug, Default)]
pub struct UpdateBatcher {
    interval_ms: u64,
    prices: BTreeMap<String, PendingPrice>,
    best_quotes: BTreeMap<String, PendingBestQuote>,
}

impl UpdateBatcher {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            ..Self::default()
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_batching(&self) -> bool {
        self.interval_ms > 0
    }

    pub(super) fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
    }

    pub fn defer_price(&mut self, security: &str, bid: Option<f64>, offer: Option<f64>) {
        self.prices
            .entry(security.to_string())
            .or_default()
            .merge(bid, offer);
    }

    /// Later best quotes for the same request replace earlier ones.
    pub fn defer_best_quote(&mut self, id: &str, price: f64, own: bool) {
        self.best_quotes
            .insert(id.to_string(), PendingBestQuote { price, own });
    }

    /// Number of securities and requests waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.prices.len() + self.best_quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }

    fn take_prices(&mut self) -> BTreeMap<String, PendingPrice> {
        mem::take(&mut self.prices)
    }

    fn take_best_quotes(&mut self) -> BTreeMap<String, PendingBestQuote> {
        mem::take(&mut self.best_quotes)
    }

    pub fn clear(&mut self) {
        self.prices.clear();
        self.best_quotes.clear();
    }
}

impl Blotter {
    /// Applies every deferred update, one notification per touched scope.
    pub fn flush_price_updates(&mut self) -> Vec<ChangeEvent> {
        if self.batcher.is_empty() {
            return Vec::new();
        }

        let mut cells = Vec::new();
        for (security, pending) in self.batcher.take_prices() {
            self.prices.update(&security, pending.bid, pending.offer);
            cells.extend(self.apply_security_price(&security));
        }
        for (id, pending) in self.batcher.take_best_quotes() {
            cells.extend(self.apply_best_quote(&id, pending.price, pending.own));
        }

        let merged = merge_ranges(cells);
        trace!("Flushed price updates into {} ranges", merged.len());
        merged.into_iter().map(CellRange::into_event).collect()
    }

    /// Changes the batching interval, first flushing anything pending.
    pub fn set_price_update_interval(&mut self, interval_ms: u64) -> Vec<ChangeEvent> {
        let events = self.flush_price_updates();
        self.batcher.set_interval(interval_ms);
        events
    }

    pub fn price_update_interval_ms(&self) -> u64 {
        self.batcher.interval_ms()
    }
}
