//! # RFQ Blotter
//!
//! A live aggregation tree for a dealer's quote-request blotter. Incoming
//! requests for quote (RFQs) and in-flight settlements are grouped by asset
//! class and security, and every mutation reports the minimal set of row and
//! cell changes a display layer needs to stay in sync.
//!
//! ## Key Features
//!
//! - **Three-Level Tree**: Markets (one per asset class plus a reserved
//!   settlements bucket) hold per-security Groups, which hold the individual
//!   entries. Nodes live in generation-checked arenas, so a handle kept past
//!   removal resolves to nothing instead of a reused slot.
//!
//! - **Bounded Visibility**: each Group shows a limited number of unquoted
//!   entries expanded and summarises the rest as "N of M".
//!
//! - **Price Coloring**: indicative prices follow the market-data feed and
//!   color up or down; our quoted price is compared with the best competing
//!   quote.
//!
//! - **Expiry Sweeping**: a periodic tick removes withdrawn and expired
//!   requests, drains deferred deletions and refreshes countdowns.
//!
//! - **Batched Notifications**: price updates can be coalesced over an
//!   interval into one range notification per parent row.
//!
//! ## Execution Model
//!
//! [`Blotter`] is a plain single-threaded state machine: each operation takes
//! `&mut self` and returns the [`ChangeEvent`]s it produced. [`BlotterDriver`]
//! runs it on one tokio task, fed by a cloneable [`BlotterHandle`], with the
//! sweep and batch timers and the settlement signal stream multiplexed on
//! the same loop.
//!
//! ```rust
//! use rfq_blotter::prelude::*;
//!
//! let mut blotter = Blotter::new(BlotterConfig::default());
//! let request = QuoteRequest::new("r1", "EUR/USD", "EUR", Side::Buy, 1_000_000.0, AssetType::SpotFx);
//! let events = blotter.on_new_quote_request(request);
//!
//! assert!(!events.is_empty());
//! assert_eq!(blotter.group_summary("Spot FX", "EUR/USD").as_deref(), Some("1 of 1"));
//! ```

pub mod blotter;

pub mod prelude;
mod utils;

pub use blotter::{
    AssetType, Blotter, BlotterCommand, BlotterConfig, BlotterDriver, BlotterError,
    BlotterHandle, CellRange, ChangeEvent, ChangeListener, Column, Columns, EntryHandle,
    LimitTarget, ParentScope, PriceKind, QuoteReply, QuoteReqStatus, QuoteRequest, Rfq,
    RfqTree, SettlementContainer, SettlementCounters, SettlementEvent, SettlementNotifier, Side,
};
pub use utils::current_time_millis;
