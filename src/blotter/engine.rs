//! Dispatch surface: protocol lifecycle events and read accessors.

use crate::blotter::batcher::UpdateBatcher;
use crate::blotter::change_event::{ChangeEvent, Columns};
use crate::blotter::config::BlotterConfig;
use crate::blotter::entry::Rfq;
use crate::blotter::pricing::PriceTracker;
use crate::blotter::settlement::SettlementAdapter;
use crate::blotter::sweeper::ExpirySweeper;
use crate::blotter::tree::{EntryHandle, EntryParent, RfqTree};
use crate::blotter::types::{AssetType, Column, QuoteReqStatus, QuoteRequest, QuoteStanding};
use tracing::{debug, info, trace};

/// Text shown in the quoted-price cell after our quote was pulled.
pub const PULLED_TEXT: &str = "pulled";

/// Live RFQ blotter.
///
/// Single-threaded state machine: every mutation takes `&mut self` and
/// returns the [`ChangeEvent`]s it produced, in emission order. Unknown ids
/// and duplicate inserts are absorbed and logged, never reported as errors.
#[derive(Debug)]
pub struct Blotter {
    pub(super) config: BlotterConfig,
    pub(super) tree: RfqTree,
    pub(super) prices: PriceTracker,
    pub(super) batcher: UpdateBatcher,
    pub(super) sweeper: ExpirySweeper,
    pub(super) settlements: SettlementAdapter,
    pub(super) show_quoted: bool,
}

impl Default for Blotter {
    fn default() -> Self {
        Self::new(BlotterConfig::default())
    }
}

impl Blotter {
    pub fn new(config: BlotterConfig) -> Self {
        Self {
            tree: RfqTree::new(),
            prices: PriceTracker::new(),
            batcher: UpdateBatcher::new(config.price_update_interval_ms),
            sweeper: ExpirySweeper::new(config.sweep_interval_ms),
            settlements: SettlementAdapter::new(),
            show_quoted: config.show_quoted,
            config,
        }
    }

    pub fn config(&self) -> &BlotterConfig {
        &self.config
    }

    pub fn tree(&self) -> &RfqTree {
        &self.tree
    }

    /// New quote request from the gateway. A known id only updates its status.
    pub fn on_new_quote_request(&mut self, request: QuoteRequest) -> Vec<ChangeEvent> {
        if self.tree.find_by_id(&request.id).is_some() {
            trace!("Request {} already tracked, updating status", request.id);
            return self.set_status(&request.id, request.status);
        }

        let indicative =
            self.prices
                .indicative_price(&request.security, &request.product, request.side);
        let rfq = Rfq::from_request(&request, indicative, self.config.entry_timeout_ms as i64);
        let spec = self.config.market_spec(request.asset_type);

        let mut events = Vec::new();
        self.tree
            .insert(&spec, &request.security, rfq, &mut events);
        events
    }

    /// Our quote was pulled: the request goes back to pending and unquoted.
    pub fn on_quote_notif_cancelled(&mut self, id: &str) -> Vec<ChangeEvent> {
        let Some(handle) = self.request_handle(id) else {
            debug!("Quote cancel for unknown request {}", id);
            return Vec::new();
        };

        let mut events = Vec::new();
        if let Some(entry) = self.tree.entry_mut(handle) {
            let rfq = &mut entry.rfq;
            rfq.quoted_px = 0.0;
            rfq.quoted_price_text = PULLED_TEXT.to_string();
            rfq.quoted_standing = QuoteStanding::None;
        }
        if let Some((scope, row)) = self.tree.entry_position(handle) {
            events.push(ChangeEvent::updated(scope, row, Columns::QUOTED_PX));
        }
        if self.tree.unmark_quoted(handle, &mut events) {
            self.push_group_summary(handle, &mut events);
        }
        events.extend(self.set_status(id, QuoteReqStatus::PendingAck));
        events
    }

    /// Requestor cancelled. Only user-initiated cancels remove the entry.
    pub fn on_quote_req_cancelled(&mut self, id: &str, by_user: bool) -> Vec<ChangeEvent> {
        if !by_user {
            trace!("Ignoring non-user cancel of {}", id);
            return Vec::new();
        }
        if self.request_handle(id).is_none() {
            debug!("Cancel for unknown request {}", id);
            return Vec::new();
        }
        let mut events = self.set_status(id, QuoteReqStatus::Withdrawn);
        self.remove_entry(id, &mut events);
        events
    }

    /// Gateway rejected the request.
    pub fn on_quote_rejected(&mut self, id: &str, reason: &str) -> Vec<ChangeEvent> {
        if self.request_handle(id).is_none() {
            debug!("Reject for unknown request {}", id);
            return Vec::new();
        }
        debug!("Request {} rejected: {}", id, reason);
        let mut events = self.set_status(id, QuoteReqStatus::Rejected);
        self.remove_entry(id, &mut events);
        events
    }

    /// Handle of the quote request `id`. Settlement entries are not requests.
    pub(super) fn request_handle(&self, id: &str) -> Option<EntryHandle> {
        let handle = self.tree.find_by_id(id)?;
        self.tree
            .entry(handle)
            .is_some_and(|entry| entry.rfq().request.is_some())
            .then_some(handle)
    }

    /// Removes `id` from the tree, releasing its settlement binding first.
    pub(super) fn remove_entry(
        &mut self,
        id: &str,
        events: &mut Vec<ChangeEvent>,
    ) -> Option<Rfq> {
        self.settlements.release(id);
        self.tree.remove_by_id(id, events)
    }

    /// Moves a tracked request to `status`.
    ///
    /// Replied releases the entry's visibility slot, Withdrawn clears the
    /// quoted flag. Settlement entries have no request status and are skipped.
    pub fn set_status(&mut self, id: &str, status: QuoteReqStatus) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        let Some(handle) = self.tree.find_by_id(id) else {
            debug!("Status {} for unknown request {}", status, id);
            return events;
        };
        let Some(entry) = self.tree.entry_mut(handle) else {
            return events;
        };
        let Some(request) = entry.rfq.request.as_mut() else {
            trace!("Status update ignored for settlement {}", id);
            return events;
        };

        request.status = status;
        let rfq = &mut entry.rfq;
        rfq.state = status;
        rfq.status.text = status.description().to_string();
        rfq.status.show_progress = status.shows_progress();
        rfq.status_color = status.color();

        let counters_changed = match status {
            QuoteReqStatus::Replied => self.tree.mark_quoted(handle, &mut events),
            QuoteReqStatus::Withdrawn => self.tree.unmark_quoted(handle, &mut events),
            _ => false,
        };

        if let Some((scope, row)) = self.tree.entry_position(handle) {
            events.push(ChangeEvent::updated(scope, row, Column::Status));
        }
        if counters_changed {
            self.push_group_summary(handle, &mut events);
        }
        events.push(ChangeEvent::StatusChanged {
            request_id: id.to_string(),
            status,
        });
        events
    }

    fn push_group_summary(&self, entry: EntryHandle, events: &mut Vec<ChangeEvent>) {
        if let Some(EntryParent::Group(group)) = self.tree.entry(entry).map(|e| e.parent()) {
            if let Some((scope, row)) = self.tree.group_position(group) {
                events.push(ChangeEvent::updated(scope, row, Columns::PRODUCT));
            }
        }
    }

    /// Drops every node, pending deletion and batched update.
    ///
    /// Cached market prices survive, so requests arriving afterwards still get
    /// an indicative price.
    pub fn clear(&mut self) -> Vec<ChangeEvent> {
        self.tree.clear();
        self.batcher.clear();
        self.sweeper.clear();
        self.settlements.clear();
        info!("Blotter cleared");
        vec![ChangeEvent::Reset]
    }

    pub fn quote_request_by_id(&self, id: &str) -> Option<&QuoteRequest> {
        self.rfq_by_id(id).and_then(|rfq| rfq.request.as_ref())
    }

    pub fn rfq_by_id(&self, id: &str) -> Option<&Rfq> {
        self.entry(self.tree.find_by_id(id)?)
    }

    pub fn entry(&self, handle: EntryHandle) -> Option<&Rfq> {
        self.tree.entry(handle).map(|entry| entry.rfq())
    }

    /// Effective visibility of the entry `id`.
    pub fn is_visible(&self, id: &str) -> bool {
        self.tree
            .find_by_id(id)
            .is_some_and(|handle| self.tree.is_entry_visible(handle))
    }

    /// Display priority of a Market row; the settlements bucket comes first.
    pub fn market_sort_order(&self, market: &str) -> Option<u8> {
        if market == self.config.settlements_market_name {
            return Some(0);
        }
        AssetType::from_market_name(market).map(|asset_type| asset_type.sort_order())
    }

    pub fn sweep_interval_ms(&self) -> u64 {
        self.sweeper.interval_ms()
    }

    /// Number of ids waiting for the next sweep.
    pub fn pending_removals(&self) -> usize {
        self.sweeper.pending_len()
    }

    pub fn active_settlements(&self) -> usize {
        self.settlements.active_len()
    }
}
