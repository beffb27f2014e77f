//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use rfq_blotter::prelude::*;
//! ```

// Core blotter types
pub use crate::blotter::{Blotter, BlotterConfig, BlotterError};

// Driver
pub use crate::blotter::driver::{BlotterCommand, BlotterDriver, BlotterHandle};

// Change notifications
pub use crate::blotter::change_event::{
    CellRange, ChangeEvent, ChangeListener, Columns, ParentScope,
};

// Tree and entries
pub use crate::blotter::entry::{EntryStatus, Rfq};
pub use crate::blotter::tree::{EntryHandle, EntryParent, GroupHandle, MarketHandle, NodeRef};
pub use crate::blotter::visibility::LimitTarget;

// Inbound value types
pub use crate::blotter::types::{
    AssetType, Column, PriceKind, PriceTrend, QuoteReply, QuoteReqStatus, QuoteRequest,
    QuoteStanding, Side, StatusColor,
};

// Settlements
pub use crate::blotter::settlement::{
    SettlementContainer, SettlementCounters, SettlementEvent, SettlementNotifier,
};

// Utility functions
pub use crate::utils::current_time_millis;
