//! Tree Store: Markets own Groups own Entries.
//!
//! Ownership flows strictly downward through three arenas; parent links are
//! plain handles. Every structural mutation appends its [`ChangeEvent`]s to
//! the caller's buffer, bottom-up, so a cascade (entry, then its emptied
//! group, then its emptied market) produces one `Removed` per step.

use crate::blotter::arena::{Arena, Handle};
use crate::blotter::change_event::{ChangeEvent, ParentScope};
use crate::blotter::entry::Rfq;
use std::collections::HashMap;
use tracing::{debug, trace};

pub type MarketHandle = Handle<Market>;
pub type GroupHandle = Handle<Group>;
pub type EntryHandle = Handle<Entry>;

/// Top-level bucket keyed by asset-class name.
#[derive(Debug)]
pub struct Market {
    pub(super) name: String,
    pub(super) limit: i32,
    pub(super) pinned: bool,
    pub(super) groups: Vec<GroupHandle>,
    pub(super) settlements: Vec<EntryHandle>,
}

impl Market {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Visibility limit inherited by Groups created in this Market.
    pub fn limit(&self) -> i32 {
        self.limit
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn groups(&self) -> &[GroupHandle] {
        &self.groups
    }

    /// Settlement entries held directly by this Market, listed after its Groups.
    pub fn settlements(&self) -> &[EntryHandle] {
        &self.settlements
    }

    pub fn child_count(&self) -> usize {
        self.groups.len() + self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.child_count() == 0
    }
}

/// Per-security group of entries inside one Market.
#[derive(Debug)]
pub struct Group {
    pub(super) security: String,
    pub(super) market: MarketHandle,
    pub(super) entries: Vec<EntryHandle>,
    pub(super) limit: i32,
    pub(super) visible_count: usize,
    pub(super) quoted_count: usize,
}

impl Group {
    pub fn security(&self) -> &str {
        &self.security
    }

    pub fn market(&self) -> MarketHandle {
        self.market
    }

    /// Entries in arrival order.
    pub fn entries(&self) -> &[EntryHandle] {
        &self.entries
    }

    /// `< 0` means unlimited.
    pub fn limit(&self) -> i32 {
        self.limit
    }

    pub fn visible_count(&self) -> usize {
        self.visible_count
    }

    pub fn quoted_count(&self) -> usize {
        self.quoted_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bounded window size, `None` when unlimited.
    pub fn capacity(&self) -> Option<usize> {
        usize::try_from(self.limit).ok()
    }

    pub(super) fn has_free_slot(&self) -> bool {
        self.capacity().is_some_and(|cap| self.visible_count < cap)
    }
}

/// Back-reference from an entry to the node holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryParent {
    Group(GroupHandle),
    /// Settlement entries hang directly off the reserved Market.
    Settlements(MarketHandle),
}

#[derive(Debug)]
pub struct Entry {
    pub(super) parent: EntryParent,
    pub(super) rfq: Rfq,
}

impl Entry {
    pub fn parent(&self) -> EntryParent {
        self.parent
    }

    pub fn rfq(&self) -> &Rfq {
        &self.rfq
    }
}

/// How to create a Market lazily on first insertion.
#[derive(Debug, Clone, Copy)]
pub struct MarketSpec<'a> {
    pub name: &'a str,
    pub limit: i32,
    pub pinned: bool,
}

/// Any node of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Market(MarketHandle),
    Group(GroupHandle),
    Entry(EntryHandle),
}

/// Three-level Market → Group → Entry index with stable handles.
#[derive(Debug, Default)]
pub struct RfqTree {
    pub(super) markets: Arena<Market>,
    pub(super) groups: Arena<Group>,
    pub(super) entries: Arena<Entry>,
    pub(super) market_order: Vec<MarketHandle>,
    by_id: HashMap<String, EntryHandle>,
}

impl RfqTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn market(&self, handle: MarketHandle) -> Option<&Market> {
        self.markets.get(handle)
    }

    pub fn group(&self, handle: GroupHandle) -> Option<&Group> {
        self.groups.get(handle)
    }

    pub fn entry(&self, handle: EntryHandle) -> Option<&Entry> {
        self.entries.get(handle)
    }

    pub(crate) fn entry_mut(&mut self, handle: EntryHandle) -> Option<&mut Entry> {
        self.entries.get_mut(handle)
    }

    /// Markets in display order.
    pub fn markets(&self) -> &[MarketHandle] {
        &self.market_order
    }

    pub fn market_count(&self) -> usize {
        self.market_order.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.market_order.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<EntryHandle> {
        self.by_id.get(id).copied()
    }

    pub fn find_by_market_name(&self, name: &str) -> Option<MarketHandle> {
        self.market_order
            .iter()
            .copied()
            .find(|h| self.markets.get(*h).is_some_and(|m| m.name == name))
    }

    pub fn find_group(&self, market: MarketHandle, security: &str) -> Option<GroupHandle> {
        self.group_slot(market, security).map(|(handle, _)| handle)
    }

    fn group_slot(&self, market: MarketHandle, security: &str) -> Option<(GroupHandle, usize)> {
        let market = self.markets.get(market)?;
        market
            .groups
            .iter()
            .enumerate()
            .find(|(_, h)| self.groups.get(**h).is_some_and(|g| g.security == security))
            .map(|(row, h)| (*h, row))
    }

    pub fn market_row(&self, market: MarketHandle) -> Option<usize> {
        self.market_order.iter().position(|h| *h == market)
    }

    pub fn group_row(&self, group: GroupHandle) -> Option<usize> {
        let market = self.groups.get(group)?.market;
        self.markets
            .get(market)?
            .groups
            .iter()
            .position(|h| *h == group)
    }

    /// Scope whose children are this Group's entries.
    pub fn group_scope(&self, group: GroupHandle) -> Option<ParentScope> {
        let market = self.groups.get(group)?.market;
        Some(ParentScope::Group {
            market: self.market_row(market)?,
            group: self.group_row(group)?,
        })
    }

    /// Scope whose children are this Market's groups and settlements.
    pub fn market_scope(&self, market: MarketHandle) -> Option<ParentScope> {
        self.market_row(market).map(ParentScope::Market)
    }

    pub fn market_position(&self, market: MarketHandle) -> Option<(ParentScope, usize)> {
        Some((ParentScope::Root, self.market_row(market)?))
    }

    pub fn group_position(&self, group: GroupHandle) -> Option<(ParentScope, usize)> {
        let market = self.groups.get(group)?.market;
        Some((self.market_scope(market)?, self.group_row(group)?))
    }

    pub fn entry_position(&self, entry: EntryHandle) -> Option<(ParentScope, usize)> {
        match self.entries.get(entry)?.parent {
            EntryParent::Group(group) => {
                let row = self
                    .groups
                    .get(group)?
                    .entries
                    .iter()
                    .position(|h| *h == entry)?;
                Some((self.group_scope(group)?, row))
            }
            EntryParent::Settlements(market) => {
                let node = self.markets.get(market)?;
                let offset = node.settlements.iter().position(|h| *h == entry)?;
                Some((self.market_scope(market)?, node.groups.len() + offset))
            }
        }
    }

    /// Parent scope and row of any node.
    pub fn position_of(&self, node: NodeRef) -> Option<(ParentScope, usize)> {
        match node {
            NodeRef::Market(h) => self.market_position(h),
            NodeRef::Group(h) => self.group_position(h),
            NodeRef::Entry(h) => self.entry_position(h),
        }
    }

    /// Child at `row` under `scope`.
    pub fn child_at(&self, scope: ParentScope, row: usize) -> Option<NodeRef> {
        match scope {
            ParentScope::Root => self.market_order.get(row).copied().map(NodeRef::Market),
            ParentScope::Market(market_row) => {
                let market = self.markets.get(*self.market_order.get(market_row)?)?;
                match market.groups.get(row) {
                    Some(group) => Some(NodeRef::Group(*group)),
                    None => market
                        .settlements
                        .get(row - market.groups.len())
                        .copied()
                        .map(NodeRef::Entry),
                }
            }
            ParentScope::Group { market, group } => {
                let market = self.markets.get(*self.market_order.get(market)?)?;
                let group = self.groups.get(*market.groups.get(group)?)?;
                group.entries.get(row).copied().map(NodeRef::Entry)
            }
        }
    }

    pub fn child_count(&self, scope: ParentScope) -> usize {
        match scope {
            ParentScope::Root => self.market_order.len(),
            ParentScope::Market(row) => self
                .market_order
                .get(row)
                .and_then(|h| self.markets.get(*h))
                .map_or(0, Market::child_count),
            ParentScope::Group { .. } => match self.scope_group(scope) {
                Some(group) => self.groups.get(group).map_or(0, Group::len),
                None => 0,
            },
        }
    }

    fn scope_group(&self, scope: ParentScope) -> Option<GroupHandle> {
        match scope {
            ParentScope::Group { market, group } => {
                let market = self.markets.get(*self.market_order.get(market)?)?;
                market.groups.get(group).copied()
            }
            _ => None,
        }
    }

    /// Groups of every Market, in display order.
    pub fn groups_in_order(&self) -> Vec<GroupHandle> {
        self.market_order
            .iter()
            .filter_map(|h| self.markets.get(*h))
            .flat_map(|m| m.groups.iter().copied())
            .collect()
    }

    /// Request entries of every Group trading `security`, in display order.
    pub fn entries_for_security(&self, security: &str) -> Vec<EntryHandle> {
        self.groups_in_order()
            .into_iter()
            .filter_map(|h| self.groups.get(h))
            .filter(|g| g.security == security)
            .flat_map(|g| g.entries.iter().copied())
            .collect()
    }

    /// Every entry held by a Group, in display order.
    pub fn request_entries(&self) -> Vec<EntryHandle> {
        self.groups_in_order()
            .into_iter()
            .filter_map(|h| self.groups.get(h))
            .flat_map(|g| g.entries.iter().copied())
            .collect()
    }

    /// Every settlement entry, in display order.
    pub fn settlement_entries(&self) -> Vec<EntryHandle> {
        self.market_order
            .iter()
            .filter_map(|h| self.markets.get(*h))
            .flat_map(|m| m.settlements.iter().copied())
            .collect()
    }

    /// Returns the Market named in `spec` and its row, creating it if needed.
    pub(crate) fn ensure_market(
        &mut self,
        spec: &MarketSpec<'_>,
        events: &mut Vec<ChangeEvent>,
    ) -> (MarketHandle, usize) {
        if let Some(handle) = self.find_by_market_name(spec.name) {
            if let Some(row) = self.market_row(handle) {
                return (handle, row);
            }
        }

        let handle = self.markets.insert(Market {
            name: spec.name.to_string(),
            limit: spec.limit,
            pinned: spec.pinned,
            groups: Vec::new(),
            settlements: Vec::new(),
        });
        self.market_order.push(handle);
        let row = self.market_order.len() - 1;
        events.push(ChangeEvent::inserted(ParentScope::Root, row));
        trace!("Created market {} at row {}", spec.name, row);
        (handle, row)
    }

    fn ensure_group(
        &mut self,
        market: MarketHandle,
        market_row: usize,
        security: &str,
        events: &mut Vec<ChangeEvent>,
    ) -> (GroupHandle, usize) {
        if let Some(slot) = self.group_slot(market, security) {
            return slot;
        }

        let (limit, row) = self
            .markets
            .get(market)
            .map_or((-1, 0), |m| (m.limit, m.groups.len()));
        let handle = self.groups.insert(Group {
            security: security.to_string(),
            market,
            entries: Vec::new(),
            limit,
            visible_count: 0,
            quoted_count: 0,
        });
        if let Some(node) = self.markets.get_mut(market) {
            node.groups.push(handle);
        }
        events.push(ChangeEvent::inserted(ParentScope::Market(market_row), row));
        trace!("Created group {} at row {} of market {}", security, row, market_row);
        (handle, row)
    }

    /// Appends `rfq` to the Group `(market, security)`, creating both lazily.
    ///
    /// An id that is already present is left untouched and its existing
    /// handle returned; callers update status instead.
    pub fn insert(
        &mut self,
        market: &MarketSpec<'_>,
        security: &str,
        rfq: Rfq,
        events: &mut Vec<ChangeEvent>,
    ) -> EntryHandle {
        if let Some(existing) = self.find_by_id(&rfq.id) {
            debug!("Entry {} already present, insert ignored", rfq.id);
            return existing;
        }

        let (market, market_row) = self.ensure_market(market, events);
        let (group, group_row) = self.ensure_group(market, market_row, security, events);

        let row = self.groups.get(group).map_or(0, Group::len);
        let id = rfq.id.clone();
        let handle = self.entries.insert(Entry {
            parent: EntryParent::Group(group),
            rfq,
        });
        if let Some(node) = self.groups.get_mut(group) {
            node.entries.push(handle);
        }
        self.by_id.insert(id, handle);
        events.push(ChangeEvent::inserted(
            ParentScope::Group {
                market: market_row,
                group: group_row,
            },
            row,
        ));

        self.admit_on_insert(group, handle, events);
        handle
    }

    /// Appends a settlement entry directly under the reserved Market.
    pub fn insert_settlement(
        &mut self,
        market: &MarketSpec<'_>,
        rfq: Rfq,
        events: &mut Vec<ChangeEvent>,
    ) -> EntryHandle {
        if let Some(existing) = self.find_by_id(&rfq.id) {
            debug!("Settlement {} already present, insert ignored", rfq.id);
            return existing;
        }

        let (market, market_row) = self.ensure_market(market, events);
        let row = self.markets.get(market).map_or(0, Market::child_count);
        let id = rfq.id.clone();
        let handle = self.entries.insert(Entry {
            parent: EntryParent::Settlements(market),
            rfq,
        });
        if let Some(node) = self.markets.get_mut(market) {
            node.settlements.push(handle);
        }
        self.by_id.insert(id, handle);
        events.push(ChangeEvent::inserted(ParentScope::Market(market_row), row));
        handle
    }

    /// Removes an entry and prunes the Group and Market it leaves empty.
    ///
    /// Returns the removed payload, or `None` for a stale handle.
    pub fn remove(&mut self, entry: EntryHandle, events: &mut Vec<ChangeEvent>) -> Option<Rfq> {
        let (scope, row) = self.entry_position(entry)?;
        let removed = self.entries.remove(entry)?;
        self.by_id.remove(&removed.rfq.id);
        events.push(ChangeEvent::removed(scope, row));
        trace!("Removed entry {} from row {} of {:?}", removed.rfq.id, row, scope);

        match removed.parent {
            EntryParent::Group(group) => {
                if let Some(node) = self.groups.get_mut(group) {
                    node.entries.retain(|h| *h != entry);
                }
                if self.groups.get(group).is_some_and(Group::is_empty) {
                    self.remove_group(group, events);
                } else {
                    self.release_slot(group, &removed.rfq, events);
                }
            }
            EntryParent::Settlements(market) => {
                if let Some(node) = self.markets.get_mut(market) {
                    node.settlements.retain(|h| *h != entry);
                }
                self.prune_market(market, events);
            }
        }

        Some(removed.rfq)
    }

    pub fn remove_by_id(&mut self, id: &str, events: &mut Vec<ChangeEvent>) -> Option<Rfq> {
        let handle = self.find_by_id(id)?;
        self.remove(handle, events)
    }

    fn remove_group(&mut self, group: GroupHandle, events: &mut Vec<ChangeEvent>) {
        let Some((scope, row)) = self.group_position(group) else {
            return;
        };
        let Some(removed) = self.groups.remove(group) else {
            return;
        };
        for orphan in removed.entries {
            if let Some(entry) = self.entries.remove(orphan) {
                self.by_id.remove(&entry.rfq.id);
            }
        }
        if let Some(node) = self.markets.get_mut(removed.market) {
            node.groups.retain(|h| *h != group);
        }
        events.push(ChangeEvent::removed(scope, row));
        trace!("Removed empty group {}", removed.security);

        self.prune_market(removed.market, events);
    }

    fn prune_market(&mut self, market: MarketHandle, events: &mut Vec<ChangeEvent>) {
        let prunable = self
            .markets
            .get(market)
            .is_some_and(|m| m.is_empty() && !m.pinned);
        if !prunable {
            return;
        }
        let Some(row) = self.market_row(market) else {
            return;
        };
        if let Some(removed) = self.markets.remove(market) {
            self.market_order.remove(row);
            events.push(ChangeEvent::removed(ParentScope::Root, row));
            trace!("Removed empty market {}", removed.name);
        }
    }

    /// Drops every node. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.groups.clear();
        self.markets.clear();
        self.market_order.clear();
        self.by_id.clear();
    }
}
