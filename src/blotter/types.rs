//! Inbound value types consumed by the blotter and the per-cell display enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency code whose quantities are shown with bitcoin precision.
pub const XBT_CURRENCY: &str = "XBT";

/// Side of a quote request, as seen by the requesting counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The requestor buys the product.
    Buy,
    /// The requestor sells the product.
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Asset class of a security. Each class owns one top-level Market bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    /// Spot foreign exchange.
    SpotFx,
    /// Spot bitcoin.
    SpotXbt,
    /// Private market shares.
    PrivateMarket,
}

impl AssetType {
    /// All asset classes in display order.
    pub const ALL: [AssetType; 3] = [
        AssetType::SpotFx,
        AssetType::SpotXbt,
        AssetType::PrivateMarket,
    ];

    /// Name of the Market bucket holding this asset class.
    pub fn market_name(&self) -> &'static str {
        match self {
            AssetType::SpotFx => "Spot FX",
            AssetType::SpotXbt => "Spot XBT",
            AssetType::PrivateMarket => "Private Market",
        }
    }

    /// Resolves a Market bucket name back to its asset class.
    pub fn from_market_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|at| at.market_name() == name)
    }

    /// Number of decimals used when displaying prices.
    pub fn price_precision(&self) -> usize {
        match self {
            AssetType::SpotFx => 4,
            AssetType::SpotXbt => 2,
            AssetType::PrivateMarket => 6,
        }
    }

    pub fn format_price(&self, price: f64) -> String {
        format!("{:.*}", self.price_precision(), price)
    }

    /// Formats a quantity expressed in `product` units.
    pub fn format_quantity(&self, quantity: f64, product: &str) -> String {
        let precision = match self {
            AssetType::PrivateMarket => 0,
            _ if product == XBT_CURRENCY => 8,
            _ => 2,
        };
        format!("{quantity:.precision$}")
    }

    /// Display priority of the Market row; the settlements bucket sorts first at 0.
    pub fn sort_order(&self) -> u8 {
        match self {
            AssetType::SpotFx => 1,
            AssetType::SpotXbt => 2,
            AssetType::PrivateMarket => 3,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.market_name())
    }
}

/// Lifecycle status of a quote request.
///
/// `Undefined -> PendingAck -> {Replied, Withdrawn, Rejected, TimedOut}`;
/// `Replied` may still move to `Withdrawn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuoteReqStatus {
    #[default]
    Undefined,
    Withdrawn,
    PendingAck,
    Replied,
    Rejected,
    TimedOut,
}

impl QuoteReqStatus {
    /// Text shown in the status cell.
    pub fn description(&self) -> &'static str {
        match self {
            QuoteReqStatus::Undefined => "",
            QuoteReqStatus::Withdrawn => "Withdrawn",
            QuoteReqStatus::PendingAck => "PendingAck",
            QuoteReqStatus::Replied => "Replied",
            QuoteReqStatus::Rejected => "Rejected",
            QuoteReqStatus::TimedOut => "TimedOut",
        }
    }

    /// Whether the countdown progress indicator is shown.
    pub fn shows_progress(&self) -> bool {
        matches!(self, QuoteReqStatus::PendingAck | QuoteReqStatus::Replied)
    }

    pub fn color(&self) -> StatusColor {
        match self {
            QuoteReqStatus::Withdrawn => StatusColor::Magenta,
            QuoteReqStatus::Rejected => StatusColor::Red,
            QuoteReqStatus::Replied => StatusColor::Green,
            QuoteReqStatus::TimedOut => StatusColor::Yellow,
            QuoteReqStatus::PendingAck | QuoteReqStatus::Undefined => StatusColor::None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuoteReqStatus::Withdrawn | QuoteReqStatus::Rejected | QuoteReqStatus::TimedOut
        )
    }
}

impl fmt::Display for QuoteReqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Background of the status cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusColor {
    #[default]
    None,
    Magenta,
    Red,
    Green,
    Yellow,
}

/// Movement of the indicative price against its previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceTrend {
    #[default]
    Unchanged,
    Up,
    Down,
}

/// Standing of our quoted price against the best competing quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuoteStanding {
    #[default]
    None,
    Won,
    Lost,
}

/// Which cached market-data price to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceKind {
    Bid,
    Offer,
}

/// Display columns of the blotter, in on-screen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    SecurityId = 0,
    Product,
    Side,
    Quantity,
    Party,
    Status,
    QuotedPx,
    IndicPx,
    BestPx,
}

impl Column {
    pub const COUNT: usize = 9;

    pub const ALL: [Column; Column::COUNT] = [
        Column::SecurityId,
        Column::Product,
        Column::Side,
        Column::Quantity,
        Column::Party,
        Column::Status,
        Column::QuotedPx,
        Column::IndicPx,
        Column::BestPx,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Header title.
    pub fn title(&self) -> &'static str {
        match self {
            Column::SecurityId => "SecurityID",
            Column::Product => "Product",
            Column::Side => "Side",
            Column::Quantity => "Quantity",
            Column::Party => "Party",
            Column::Status => "Status",
            Column::QuotedPx => "Quoted Price",
            Column::IndicPx => "Indicative Px",
            Column::BestPx => "Best Quoted Px",
        }
    }
}

/// A quote request notification received from the dealer gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Request identifier, unique across the blotter.
    pub id: String,
    /// Security symbol, e.g. `"EUR/USD"`.
    pub security: String,
    /// Currency or product the quantity is expressed in.
    pub product: String,
    pub side: Side,
    pub quantity: f64,
    pub asset_type: AssetType,
    /// Requesting counterparty, if disclosed.
    pub party: String,
    pub status: QuoteReqStatus,
    /// Expiration timestamp in milliseconds since the Unix epoch.
    pub expiration_ms: Option<u64>,
    /// Offset between the gateway clock and the local clock.
    pub time_skew_ms: i64,
}

impl QuoteRequest {
    /// Creates a pending request without expiration.
    pub fn new(
        id: impl Into<String>,
        security: impl Into<String>,
        product: impl Into<String>,
        side: Side,
        quantity: f64,
        asset_type: AssetType,
    ) -> Self {
        Self {
            id: id.into(),
            security: security.into(),
            product: product.into(),
            side,
            quantity,
            asset_type,
            party: String::new(),
            status: QuoteReqStatus::PendingAck,
            expiration_ms: None,
            time_skew_ms: 0,
        }
    }

    pub fn with_expiration(mut self, expiration_ms: u64, time_skew_ms: i64) -> Self {
        self.expiration_ms = Some(expiration_ms);
        self.time_skew_ms = time_skew_ms;
        self
    }

    pub fn with_status(mut self, status: QuoteReqStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party = party.into();
        self
    }

    /// Milliseconds left before expiry, `expiration + skew - now`.
    pub fn time_left_ms(&self, now_ms: u64) -> Option<i64> {
        let now = i64::try_from(now_ms).unwrap_or(i64::MAX);
        self.expiration_ms.map(|expiration| {
            i64::try_from(expiration)
                .unwrap_or(i64::MAX)
                .saturating_add(self.time_skew_ms)
                .saturating_sub(now)
        })
    }
}

/// Our own reply to a quote request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteReply {
    pub request_id: String,
    pub side: Side,
    pub bid_px: f64,
    pub offer_px: f64,
}

impl QuoteReply {
    pub fn new(request_id: impl Into<String>, side: Side, bid_px: f64, offer_px: f64) -> Self {
        Self {
            request_id: request_id.into(),
            side,
            bid_px,
            offer_px,
        }
    }

    /// Price that answers the request: our bid for a buy request, our offer otherwise.
    pub fn quoted_price(&self) -> f64 {
        match self.side {
            Side::Buy => self.bid_px,
            Side::Sell => self.offer_px,
        }
    }
}
