//! Per-row payload of a blotter entry: one column per field, no runtime role lookup.

use crate::blotter::settlement::SettlementContainer;
use crate::blotter::types::{
    AssetType, Column, PriceTrend, QuoteReqStatus, QuoteRequest, QuoteStanding, Side,
    StatusColor,
};
use serde::Serialize;

/// Status cell contents: text plus the countdown shown by the progress indicator.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EntryStatus {
    pub text: String,
    pub show_progress: bool,
    /// Total countdown duration in milliseconds.
    pub timeout_ms: i64,
    /// Remaining countdown in milliseconds, refreshed by the sweeper.
    pub time_left_ms: i64,
}

/// An outstanding quote request or a settlement in progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rfq {
    pub id: String,
    pub security: String,
    pub product: String,
    pub side: Side,
    pub side_text: String,
    pub party: String,
    pub quantity_text: String,
    pub quoted_price_text: String,
    pub indicative_text: String,
    pub best_quoted_text: String,
    pub status: EntryStatus,
    pub state: QuoteReqStatus,
    pub status_color: StatusColor,
    pub indicative_px: f64,
    pub quoted_px: f64,
    pub best_quoted_px: f64,
    /// `own` flag of the last best-quote update, reused when our quote changes.
    pub best_quote_own: bool,
    pub indicative_trend: PriceTrend,
    pub quoted_standing: QuoteStanding,
    pub asset_type: AssetType,
    /// We replied to this request; quoted entries never take a visibility slot.
    pub quoted: bool,
    /// Shown expanded inside a bounded visibility window.
    pub visible: bool,
    /// Tracked protocol request; `None` for settlement entries.
    pub request: Option<QuoteRequest>,
}

impl Rfq {
    /// Builds the row for a newly received quote request.
    pub fn from_request(request: &QuoteRequest, indicative_px: f64, timeout_ms: i64) -> Self {
        let indicative_text = if indicative_px != 0.0 {
            request.asset_type.format_price(indicative_px)
        } else {
            String::new()
        };

        Self {
            id: request.id.clone(),
            security: request.security.clone(),
            product: request.product.clone(),
            side: request.side,
            side_text: request.side.to_string(),
            party: request.party.clone(),
            quantity_text: request
                .asset_type
                .format_quantity(request.quantity, &request.product),
            quoted_price_text: String::new(),
            indicative_text,
            best_quoted_text: String::new(),
            status: EntryStatus {
                text: request.status.description().to_string(),
                show_progress: request.status.shows_progress(),
                timeout_ms,
                time_left_ms: 0,
            },
            state: request.status,
            status_color: request.status.color(),
            indicative_px,
            quoted_px: 0.0,
            best_quoted_px: 0.0,
            best_quote_own: false,
            indicative_trend: PriceTrend::Unchanged,
            quoted_standing: QuoteStanding::None,
            asset_type: request.asset_type,
            quoted: false,
            visible: false,
            request: Some(request.clone()),
        }
    }

    /// Snapshots a settlement container at hand-off time.
    pub fn from_settlement(container: &dyn SettlementContainer) -> Self {
        let asset_type = container.asset_type();
        let price = container.price();

        Self {
            id: container.id().to_string(),
            security: container.security().to_string(),
            product: container.product().to_string(),
            side: container.side(),
            side_text: container.side().to_string(),
            party: String::new(),
            quantity_text: asset_type.format_quantity(container.quantity(), container.product()),
            quoted_price_text: String::new(),
            indicative_text: asset_type.format_price(price),
            best_quoted_text: String::new(),
            status: EntryStatus {
                text: String::new(),
                show_progress: true,
                timeout_ms: 0,
                time_left_ms: container.time_left_ms(),
            },
            state: QuoteReqStatus::Undefined,
            status_color: StatusColor::None,
            indicative_px: price,
            quoted_px: 0.0,
            best_quoted_px: 0.0,
            best_quote_own: false,
            indicative_trend: PriceTrend::Unchanged,
            quoted_standing: QuoteStanding::None,
            asset_type,
            quoted: false,
            visible: false,
            request: None,
        }
    }

    /// Display text of one column.
    pub fn cell_text(&self, column: Column) -> &str {
        match column {
            Column::SecurityId => &self.security,
            Column::Product => &self.product,
            Column::Side => &self.side_text,
            Column::Quantity => &self.quantity_text,
            Column::Party => &self.party,
            Column::Status => &self.status.text,
            Column::QuotedPx => &self.quoted_price_text,
            Column::IndicPx => &self.indicative_text,
            Column::BestPx => &self.best_quoted_text,
        }
    }

    pub fn is_settlement(&self) -> bool {
        self.request.is_none()
    }
}
