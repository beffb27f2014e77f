//! Price Tracker and best-quote coloring.

use crate::blotter::change_event::{CellRange, ChangeEvent, Columns};
use crate::blotter::engine::Blotter;
use crate::blotter::types::{
    AssetType, Column, PriceKind, PriceTrend, QuoteReply, QuoteReqStatus, QuoteStanding, Side,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Cached market-data prices of one security, with the values they replaced.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PriceSample {
    pub bid: f64,
    pub offer: f64,
    pub prev_bid: f64,
    pub prev_offer: f64,
}

impl PriceSample {
    pub fn price(&self, kind: PriceKind) -> f64 {
        match kind {
            PriceKind::Bid => self.bid,
            PriceKind::Offer => self.offer,
        }
    }
}

/// Per-security bid/offer cache fed by the market-data stream.
#[derive(Debug, Default)]
pub struct PriceTracker {
    samples: HashMap<String, PriceSample>,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the fields present in the update; absent fields keep their value.
    pub fn update(&mut self, security: &str, bid: Option<f64>, offer: Option<f64>) {
        let sample = self.samples.entry(security.to_string()).or_default();
        if let Some(bid) = bid {
            sample.prev_bid = sample.bid;
            sample.bid = bid;
        }
        if let Some(offer) = offer {
            sample.prev_offer = sample.offer;
            sample.offer = offer;
        }
    }

    pub fn sample(&self, security: &str) -> Option<&PriceSample> {
        self.samples.get(security)
    }

    /// Cached price, `0.0` when the security has not been seen.
    pub fn price_for(&self, security: &str, kind: PriceKind) -> f64 {
        self.samples
            .get(security)
            .map_or(0.0, |sample| sample.price(kind))
    }

    /// Indicative price shown for a request on `security` quoted in `product`.
    pub fn indicative_price(&self, security: &str, product: &str, side: Side) -> f64 {
        let kind = if is_bid_side(security, product, side) {
            PriceKind::Bid
        } else {
            PriceKind::Offer
        };
        self.price_for(security, kind)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Whether the bid applies: the request side flips when `product` is the
/// numerator currency of the `security` pair.
pub fn is_bid_side(security: &str, product: &str, side: Side) -> bool {
    let numerator = security
        .split_once('/')
        .map_or(security, |(numerator, _)| numerator);
    (side == Side::Buy) ^ (numerator == product)
}

/// Movement from `previous` to `current`; `None` keeps the current coloring.
pub fn price_trend(previous: f64, current: f64) -> Option<PriceTrend> {
    if previous == 0.0 || current == previous {
        None
    } else if current > previous {
        Some(PriceTrend::Up)
    } else {
        Some(PriceTrend::Down)
    }
}

/// Compares our quote with the best one, exactly.
pub fn quote_standing(quoted: f64, best: f64, own: bool) -> QuoteStanding {
    if quoted == 0.0 || best == 0.0 {
        QuoteStanding::None
    } else if own && quoted == best {
        QuoteStanding::Won
    } else {
        QuoteStanding::Lost
    }
}

pub(crate) fn price_text(asset_type: AssetType, price: f64) -> String {
    if price == 0.0 {
        String::new()
    } else {
        asset_type.format_price(price)
    }
}

impl Blotter {
    /// Market-data tick for `security`.
    ///
    /// Applied immediately, or deferred to the next flush when batching.
    pub fn on_security_price_update(
        &mut self,
        security: &str,
        bid: Option<f64>,
        offer: Option<f64>,
    ) -> Vec<ChangeEvent> {
        if self.batcher.is_batching() {
            self.batcher.defer_price(security, bid, offer);
            return Vec::new();
        }
        self.prices.update(security, bid, offer);
        self.apply_security_price(security)
            .into_iter()
            .map(CellRange::into_event)
            .collect()
    }

    /// Recomputes the indicative price of every entry on `security`.
    pub(super) fn apply_security_price(&mut self, security: &str) -> Vec<CellRange> {
        let mut cells = Vec::new();
        for handle in self.tree.entries_for_security(security) {
            let indicative = match self.tree.entry(handle) {
                Some(entry) => {
                    let rfq = entry.rfq();
                    self.prices
                        .indicative_price(security, &rfq.product, rfq.side)
                }
                None => continue,
            };
            let Some(entry) = self.tree.entry_mut(handle) else {
                continue;
            };
            let rfq = &mut entry.rfq;
            if indicative == rfq.indicative_px {
                continue;
            }
            if let Some(trend) = price_trend(rfq.indicative_px, indicative) {
                rfq.indicative_trend = trend;
            }
            rfq.indicative_px = indicative;
            rfq.indicative_text = price_text(rfq.asset_type, indicative);

            if let Some((scope, row)) = self.tree.entry_position(handle) {
                cells.push(CellRange::cell(scope, row, Column::IndicPx));
            }
        }
        trace!("Price update on {} touched {} cells", security, cells.len());
        cells
    }

    /// Best competing quote for request `id`; `own` marks it as ours.
    pub fn on_best_quote_price(&mut self, id: &str, price: f64, own: bool) -> Vec<ChangeEvent> {
        if self.batcher.is_batching() {
            self.batcher.defer_best_quote(id, price, own);
            return Vec::new();
        }
        self.apply_best_quote(id, price, own)
            .map(CellRange::into_event)
            .into_iter()
            .collect()
    }

    pub(super) fn apply_best_quote(&mut self, id: &str, price: f64, own: bool) -> Option<CellRange> {
        let Some(handle) = self.request_handle(id) else {
            debug!("Best quote for unknown request {}", id);
            return None;
        };
        let entry = self.tree.entry_mut(handle)?;
        let rfq = &mut entry.rfq;
        rfq.best_quoted_px = price;
        rfq.best_quoted_text = price_text(rfq.asset_type, price);
        rfq.best_quote_own = own;
        rfq.quoted_standing = quote_standing(rfq.quoted_px, price, own);

        let (scope, row) = self.tree.entry_position(handle)?;
        Some(CellRange::span(scope, row, Column::QuotedPx, Column::BestPx))
    }

    /// Our reply went out: record the quoted price, recolor, mark Replied.
    pub fn on_quote_replied(&mut self, reply: &QuoteReply) -> Vec<ChangeEvent> {
        let Some(handle) = self.request_handle(&reply.request_id) else {
            debug!("Reply to unknown request {}", reply.request_id);
            return Vec::new();
        };
        let mut events = Vec::new();
        let price = reply.quoted_price();
        if let Some(entry) = self.tree.entry_mut(handle) {
            let rfq = &mut entry.rfq;
            rfq.quoted_px = price;
            rfq.quoted_price_text = price_text(rfq.asset_type, price);
            rfq.quoted_standing = quote_standing(price, rfq.best_quoted_px, rfq.best_quote_own);
        }
        if let Some((scope, row)) = self.tree.entry_position(handle) {
            events.push(ChangeEvent::updated(scope, row, Columns::QUOTED_PX));
        }
        events.extend(self.set_status(&reply.request_id, QuoteReqStatus::Replied));
        events
    }

    pub fn price_for(&self, security: &str, kind: PriceKind) -> f64 {
        self.prices.price_for(security, kind)
    }

    pub fn price_sample(&self, security: &str) -> Option<&PriceSample> {
        self.prices.sample(security)
    }
}
