//! RFQ blotter: a three-level Market → Group → Entry tree of live quote
//! requests and settlements, with bounded visibility, price coloring,
//! expiry sweeping and batched change notification.

mod arena;
pub mod batcher;
/// Minimal-diff notifications for the display layer.
pub mod change_event;
pub mod config;
/// Single-task tokio event loop driving a blotter.
pub mod driver;
pub mod engine;
pub mod entry;
pub mod error;
pub mod pricing;
/// Bridge between external settlement containers and the settlements bucket.
pub mod settlement;
pub mod sweeper;
pub mod tree;
pub mod types;
/// Per-Group visibility window.
pub mod visibility;

pub use arena::{Arena, Handle};
pub use change_event::{CellRange, ChangeEvent, ChangeListener, Columns, ParentScope};
pub use config::BlotterConfig;
pub use driver::{BlotterCommand, BlotterDriver, BlotterHandle};
pub use engine::Blotter;
pub use entry::{EntryStatus, Rfq};
pub use error::BlotterError;
pub use pricing::PriceSample;
pub use settlement::{
    CancellationToken, SettlementContainer, SettlementCounters, SettlementEvent,
    SettlementNotifier, SettlementSignal,
};
pub use tree::{EntryHandle, EntryParent, GroupHandle, MarketHandle, NodeRef, RfqTree};
pub use types::{
    AssetType, Column, PriceKind, PriceTrend, QuoteReply, QuoteReqStatus, QuoteRequest,
    QuoteStanding, Side, StatusColor,
};
pub use visibility::LimitTarget;
