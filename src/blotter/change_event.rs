use crate::blotter::types::{Column, QuoteReqStatus};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Compound address of the node whose children a change event refers to.
///
/// Rows are positions within that parent: Markets under `Root`, Groups and
/// then settlement entries under `Market`, request entries under `Group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParentScope {
    /// The invisible root; its children are Markets.
    Root,
    /// A Market at the given row.
    Market(usize),
    /// A Group at row `group` of the Market at row `market`.
    Group {
        /// Row of the owning Market.
        market: usize,
        /// Row of the Group inside that Market.
        group: usize,
    },
}

bitflags! {
    /// Set of columns touched by a value change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Columns: u16 {
        const SECURITY_ID = 1 << 0;
        const PRODUCT = 1 << 1;
        const SIDE = 1 << 2;
        const QUANTITY = 1 << 3;
        const PARTY = 1 << 4;
        const STATUS = 1 << 5;
        const QUOTED_PX = 1 << 6;
        const INDIC_PX = 1 << 7;
        const BEST_PX = 1 << 8;
    }
}

impl Columns {
    /// Every column between `first` and `last`, inclusive.
    pub fn span(first: Column, last: Column) -> Self {
        let (low, high) = if first <= last {
            (first, last)
        } else {
            (last, first)
        };
        (low.index()..=high.index())
            .filter_map(Column::from_index)
            .fold(Columns::empty(), |acc, column| acc | Columns::from(column))
    }

    /// Lowest column in the set.
    pub fn first_column(&self) -> Option<Column> {
        Column::ALL.into_iter().find(|c| self.contains(Columns::from(*c)))
    }

    /// Highest column in the set.
    pub fn last_column(&self) -> Option<Column> {
        Column::ALL
            .into_iter()
            .rev()
            .find(|c| self.contains(Columns::from(*c)))
    }
}

impl From<Column> for Columns {
    fn from(column: Column) -> Self {
        Columns::from_bits_truncate(1 << column.index())
    }
}

/// Minimal-diff notification for the display layer.
///
/// Events are emitted bottom-up during cascades, each one describing the tree
/// as it is right after the corresponding mutation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// Rows `first..=last` were inserted under `parent`.
    Inserted {
        parent: ParentScope,
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` were removed from `parent`.
    Removed {
        parent: ParentScope,
        first: usize,
        last: usize,
    },
    /// Cells of rows `first..=last` under `parent` changed value.
    Updated {
        parent: ParentScope,
        first: usize,
        last: usize,
        columns: Columns,
    },
    /// Visibility flags changed; an externally applied row filter must be recomputed.
    InvalidateFilter,
    /// A tracked quote request changed status.
    StatusChanged {
        request_id: String,
        status: QuoteReqStatus,
    },
    /// The whole tree was dropped.
    Reset,
}

impl ChangeEvent {
    pub fn inserted(parent: ParentScope, row: usize) -> Self {
        ChangeEvent::Inserted {
            parent,
            first: row,
            last: row,
        }
    }

    pub fn removed(parent: ParentScope, row: usize) -> Self {
        ChangeEvent::Removed {
            parent,
            first: row,
            last: row,
        }
    }

    pub fn updated(parent: ParentScope, row: usize, columns: impl Into<Columns>) -> Self {
        ChangeEvent::Updated {
            parent,
            first: row,
            last: row,
            columns: columns.into(),
        }
    }

    /// Whether the event changes the row structure rather than cell values.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ChangeEvent::Inserted { .. } | ChangeEvent::Removed { .. } | ChangeEvent::Reset
        )
    }
}

/// A listener callback for blotter change events.
///
/// This provides a point to update a corresponding external view, e.g. a UI
/// item model, whenever the tree changes.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Rectangular block of cells sharing one parent scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub parent: ParentScope,
    pub first_row: usize,
    pub last_row: usize,
    pub first_column: Column,
    pub last_column: Column,
}

impl CellRange {
    pub fn cell(parent: ParentScope, row: usize, column: Column) -> Self {
        Self::span(parent, row, column, column)
    }

    pub fn span(parent: ParentScope, row: usize, first_column: Column, last_column: Column) -> Self {
        Self {
            parent,
            first_row: row,
            last_row: row,
            first_column,
            last_column,
        }
    }

    /// Grows this range to the bounding box of itself and `other`.
    pub fn merge(&mut self, other: &CellRange) {
        self.first_row = self.first_row.min(other.first_row);
        self.last_row = self.last_row.max(other.last_row);
        self.first_column = self.first_column.min(other.first_column);
        self.last_column = self.last_column.max(other.last_column);
    }

    pub fn into_event(self) -> ChangeEvent {
        ChangeEvent::Updated {
            parent: self.parent,
            first: self.first_row,
            last: self.last_row,
            columns: Columns::span(self.first_column, self.last_column),
        }
    }
}

/// Merges cell addresses into one bounding range per parent scope.
pub fn merge_ranges(cells: impl IntoIterator<Item = CellRange>) -> Vec<CellRange> {
    let mut merged: BTreeMap<ParentScope, CellRange> = BTreeMap::new();
    for cell in cells {
        merged
            .entry(cell.parent)
            .and_modify(|range| range.merge(&cell))
            .or_insert(cell);
    }
    merged.into_values().collect()
}
