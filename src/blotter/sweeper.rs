//! Expiry Sweeper: periodic removal of finished entries and countdown refresh.

use crate::blotter::change_event::{CellRange, ChangeEvent, merge_ranges};
use crate::blotter::engine::Blotter;
use crate::blotter::types::{Column, QuoteReqStatus};
use std::collections::BTreeSet;
use std::mem;
use tracing::{debug, trace};

/// Ids waiting for deferred removal, drained on every tick.
#[derive(Debug, Default)]
pub struct ExpirySweeper {
    interval_ms: u64,
    pending_delete: BTreeSet<String>,
}

impl ExpirySweeper {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            pending_delete: BTreeSet::new(),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Returns `false` if `id` was already scheduled.
    pub fn schedule(&mut self, id: &str) -> bool {
        self.pending_delete.insert(id.to_string())
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.pending_delete.contains(id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending_delete.len()
    }

    fn take_pending(&mut self) -> BTreeSet<String> {
        mem::take(&mut self.pending_delete)
    }

    pub fn clear(&mut self) {
        self.pending_delete.clear();
    }
}

impl Blotter {
    /// Defers removal of `id` to the next sweep.
    pub fn schedule_removal(&mut self, id: &str) {
        if !self.sweeper.schedule(id) {
            trace!("Removal of {} already scheduled", id);
        }
    }

    pub fn is_removal_pending(&self, id: &str) -> bool {
        self.sweeper.is_scheduled(id)
    }

    /// One sweep at wall-clock time `now_ms`.
    ///
    /// Order: queued settlement signals, pending deletions, request expiry and
    /// countdowns, then settlement countdowns. Countdown changes produce one
    /// `Updated` per parent scope on the status column.
    pub fn tick(&mut self, now_ms: u64) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for signal in self.settlements.drain_pending_signals() {
            events.extend(self.on_settlement_signal(signal));
        }

        let deleted = self.sweeper.take_pending();
        for id in &deleted {
            if self.remove_entry(id, &mut events).is_none() {
                debug!("Pending deletion of unknown entry {}", id);
            }
        }

        let mut expired = Vec::new();
        let mut counting = Vec::new();
        for handle in self.tree.request_entries() {
            let Some(entry) = self.tree.entry_mut(handle) else {
                continue;
            };
            let rfq = &mut entry.rfq;
            if deleted.contains(&rfq.id) {
                continue;
            }
            let time_left = rfq
                .request
                .as_ref()
                .and_then(|request| request.time_left_ms(now_ms));
            if rfq.state == QuoteReqStatus::Withdrawn || time_left.is_some_and(|left| left < 0) {
                expired.push(handle);
                continue;
            }
            if let Some(left) = time_left {
                if matches!(rfq.state, QuoteReqStatus::PendingAck | QuoteReqStatus::Replied) {
                    rfq.status.time_left_ms = left;
                    counting.push(handle);
                }
            }
        }

        for handle in expired {
            if let Some(rfq) = self.tree.remove(handle, &mut events) {
                trace!("Swept expired request {}", rfq.id);
            }
        }

        for handle in self.tree.settlement_entries() {
            let Some(entry) = self.tree.entry_mut(handle) else {
                continue;
            };
            if deleted.contains(&entry.rfq.id) {
                continue;
            }
            if let Some(left) = self.settlements.time_left_ms(&entry.rfq.id) {
                entry.rfq.status.time_left_ms = left;
                counting.push(handle);
            }
        }

        let cells = counting
            .into_iter()
            .filter_map(|handle| self.tree.entry_position(handle))
            .map(|(scope, row)| CellRange::cell(scope, row, Column::Status));
        events.extend(merge_ranges(cells).into_iter().map(CellRange::into_event));
        events
    }
}
