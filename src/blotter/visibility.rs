//! Visibility Window Manager.
//!
//! A Group with `limit >= 0` shows at most `limit` unquoted entries expanded.
//! Admission depends on the trigger:
//! - insertion admits the new entry while a slot is free;
//! - an entry leaving the window (quoted or removed) frees a slot refilled
//!   back-to-front, newest first;
//! - an explicit limit change clears the window and refills front-to-back,
//!   oldest first.
//!
//! Every mutation pushes [`ChangeEvent::InvalidateFilter`], even when a refill
//! finds nothing to show.

use crate::blotter::change_event::{ChangeEvent, Columns};
use crate::blotter::engine::Blotter;
use crate::blotter::entry::Rfq;
use crate::blotter::tree::{EntryHandle, EntryParent, GroupHandle, MarketHandle, RfqTree};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Clamps every negative limit to `-1`, the unlimited marker.
pub fn normalize_limit(limit: i32) -> i32 {
    if limit < 0 { -1 } else { limit }
}

/// Which node a limit change applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitTarget {
    /// A Market and every Group it holds.
    Market(String),
    /// A single Group.
    Group { market: String, security: String },
}

impl LimitTarget {
    pub fn market(name: impl Into<String>) -> Self {
        LimitTarget::Market(name.into())
    }

    pub fn group(market: impl Into<String>, security: impl Into<String>) -> Self {
        LimitTarget::Group {
            market: market.into(),
            security: security.into(),
        }
    }
}

impl RfqTree {
    /// Shows a freshly inserted entry if its Group has a free slot.
    pub(super) fn admit_on_insert(
        &mut self,
        group: GroupHandle,
        entry: EntryHandle,
        events: &mut Vec<ChangeEvent>,
    ) {
        let Some(node) = self.groups.get_mut(group) else {
            return;
        };
        if !node.has_free_slot() {
            return;
        }
        if let Some(entry) = self.entries.get_mut(entry) {
            entry.rfq.visible = true;
            node.visible_count += 1;
            events.push(ChangeEvent::InvalidateFilter);
        }
    }

    /// Marks invisible unquoted entries visible until the window is full.
    fn refill(&mut self, group: GroupHandle, newest_first: bool) -> usize {
        let Some(node) = self.groups.get_mut(group) else {
            return 0;
        };
        let Some(capacity) = node.capacity() else {
            return 0;
        };

        let len = node.entries.len();
        let mut shown = 0;
        for step in 0..len {
            if node.visible_count >= capacity {
                break;
            }
            let position = if newest_first { len - 1 - step } else { step };
            let handle = node.entries[position];
            if let Some(entry) = self.entries.get_mut(handle) {
                if !entry.rfq.quoted && !entry.rfq.visible {
                    entry.rfq.visible = true;
                    node.visible_count += 1;
                    shown += 1;
                }
            }
        }

        if shown == 0 {
            trace!("Refill found no eligible entry");
        }
        shown
    }

    fn clear_visible_flags(&mut self, group: GroupHandle) {
        let Some(node) = self.groups.get_mut(group) else {
            return;
        };
        for handle in &node.entries {
            if let Some(entry) = self.entries.get_mut(*handle) {
                entry.rfq.visible = false;
            }
        }
        node.visible_count = 0;
    }

    /// Restores the counters after `rfq` left a surviving Group.
    pub(super) fn release_slot(
        &mut self,
        group: GroupHandle,
        rfq: &Rfq,
        events: &mut Vec<ChangeEvent>,
    ) {
        let Some(node) = self.groups.get_mut(group) else {
            return;
        };
        if rfq.quoted {
            node.quoted_count = node.quoted_count.saturating_sub(1);
        }
        if rfq.visible {
            node.visible_count = node.visible_count.saturating_sub(1);
            self.refill(group, true);
        }
        if rfq.quoted || rfq.visible {
            events.push(ChangeEvent::InvalidateFilter);
        }
    }

    /// Sets one Group's limit, then rebuilds its window oldest first.
    pub fn set_group_limit(
        &mut self,
        group: GroupHandle,
        limit: i32,
        events: &mut Vec<ChangeEvent>,
    ) {
        let Some(node) = self.groups.get_mut(group) else {
            return;
        };
        node.limit = normalize_limit(limit);
        self.clear_visible_flags(group);
        self.refill(group, false);

        if let Some((scope, row)) = self.group_position(group) {
            events.push(ChangeEvent::updated(scope, row, Columns::PRODUCT));
        }
    }

    /// Sets the Market default and applies it to every Group it holds.
    pub fn set_market_limit(
        &mut self,
        market: MarketHandle,
        limit: i32,
        events: &mut Vec<ChangeEvent>,
    ) {
        let Some(node) = self.markets.get_mut(market) else {
            return;
        };
        node.limit = normalize_limit(limit);
        let groups = node.groups.clone();
        for group in groups {
            self.set_group_limit(group, limit, events);
        }
    }

    /// Flags an entry as quoted, releasing its visibility slot.
    ///
    /// Returns whether the quoted flag or the Group counters changed.
    pub fn mark_quoted(&mut self, entry: EntryHandle, events: &mut Vec<ChangeEvent>) -> bool {
        let Some(EntryParent::Group(group)) = self.entries.get(entry).map(|e| e.parent) else {
            return false;
        };
        let (Some(node), Some(entry)) = (self.groups.get_mut(group), self.entries.get_mut(entry))
        else {
            return false;
        };

        let mut changed = false;
        if !entry.rfq.quoted {
            entry.rfq.quoted = true;
            node.quoted_count += 1;
            changed = true;
        }
        let released = entry.rfq.visible;
        if released {
            entry.rfq.visible = false;
            node.visible_count = node.visible_count.saturating_sub(1);
            changed = true;
        }

        if released {
            self.refill(group, true);
        }
        events.push(ChangeEvent::InvalidateFilter);
        changed
    }

    /// Clears the quoted flag. The entry stays hidden until the next refill.
    pub fn unmark_quoted(&mut self, entry: EntryHandle, events: &mut Vec<ChangeEvent>) -> bool {
        let Some(EntryParent::Group(group)) = self.entries.get(entry).map(|e| e.parent) else {
            return false;
        };
        let (Some(node), Some(entry)) = (self.groups.get_mut(group), self.entries.get_mut(entry))
        else {
            return false;
        };
        if !entry.rfq.quoted {
            return false;
        }
        entry.rfq.quoted = false;
        node.quoted_count = node.quoted_count.saturating_sub(1);
        events.push(ChangeEvent::InvalidateFilter);
        true
    }

    /// Effective visibility: unlimited Groups show every unquoted entry.
    pub fn is_entry_visible(&self, entry: EntryHandle) -> bool {
        let Some(node) = self.entries.get(entry) else {
            return false;
        };
        match node.parent {
            EntryParent::Group(group) => match self.groups.get(group) {
                Some(g) if g.limit < 0 => !node.rfq.quoted,
                Some(_) => node.rfq.visible,
                None => false,
            },
            EntryParent::Settlements(_) => true,
        }
    }

    /// "N of M" for bounded Groups, "M RFQ" otherwise.
    pub fn group_summary(&self, group: GroupHandle, show_quoted: bool) -> Option<String> {
        let node = self.groups.get(group)?;
        let total = node.len();
        if node.limit > 0 {
            let shown = node.visible_count + if show_quoted { node.quoted_count } else { 0 };
            Some(format!("{shown} of {total}"))
        } else {
            Some(format!("{total} RFQ"))
        }
    }

    pub fn has_hidden_children(&self, group: GroupHandle) -> Option<bool> {
        let node = self.groups.get(group)?;
        Some(node.visible_count + node.quoted_count < node.len())
    }
}

impl Blotter {
    /// Applies a new visibility limit to a Market or a single Group.
    ///
    /// Negative values mean unlimited, zero hides every entry.
    pub fn set_group_limit(&mut self, target: &LimitTarget, limit: i32) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        match target {
            LimitTarget::Market(name) => {
                let Some(market) = self.tree.find_by_market_name(name) else {
                    debug!("Limit change for unknown market {}", name);
                    return events;
                };
                self.tree.set_market_limit(market, limit, &mut events);
            }
            LimitTarget::Group { market, security } => {
                let group = self
                    .tree
                    .find_by_market_name(market)
                    .and_then(|m| self.tree.find_group(m, security));
                let Some(group) = group else {
                    debug!("Limit change for unknown group {}/{}", market, security);
                    return events;
                };
                self.tree.set_group_limit(group, limit, &mut events);
            }
        }
        events.push(ChangeEvent::InvalidateFilter);
        events
    }

    /// Toggles whether quoted entries count towards the "N of M" summary.
    pub fn set_show_quoted_filter(&mut self, show_quoted: bool) -> Vec<ChangeEvent> {
        if self.show_quoted == show_quoted {
            return Vec::new();
        }
        self.show_quoted = show_quoted;
        self.tree
            .groups_in_order()
            .into_iter()
            .filter_map(|group| self.tree.group_position(group))
            .map(|(scope, row)| ChangeEvent::updated(scope, row, Columns::PRODUCT))
            .collect()
    }

    pub fn show_quoted(&self) -> bool {
        self.show_quoted
    }

    /// Summary text of the Group `(market, security)`.
    pub fn group_summary(&self, market: &str, security: &str) -> Option<String> {
        let market = self.tree.find_by_market_name(market)?;
        let group = self.tree.find_group(market, security)?;
        self.tree.group_summary(group, self.show_quoted)
    }

    pub fn has_hidden_children(&self, market: &str, security: &str) -> Option<bool> {
        let market = self.tree.find_by_market_name(market)?;
        let group = self.tree.find_group(market, security)?;
        self.tree.has_hidden_children(group)
    }
}
