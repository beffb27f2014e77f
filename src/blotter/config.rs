//! Runtime configuration of the blotter.

use crate::blotter::error::BlotterError;
use crate::blotter::tree::MarketSpec;
use crate::blotter::types::AssetType;
use crate::blotter::visibility::normalize_limit;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::trace;

/// Default visibility limit of every asset-class Market.
pub const DEFAULT_RFQ_LIMIT: i32 = 5;

/// Default Expiry Sweeper tick.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 500;

/// Default countdown total shown for pending and replied requests.
pub const DEFAULT_ENTRY_TIMEOUT_MS: u64 = 30_000;

/// Default name of the reserved settlements bucket.
pub const DEFAULT_SETTLEMENTS_MARKET: &str = "Settlements";

/// Blotter settings. Every field has a default, so partial JSON documents load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlotterConfig {
    /// Visibility limit for new Groups in the Spot FX Market, `< 0` unlimited.
    pub fx_rfq_limit: i32,
    /// Visibility limit for new Groups in the Spot XBT Market.
    pub xbt_rfq_limit: i32,
    /// Visibility limit for new Groups in the Private Market.
    pub pm_rfq_limit: i32,
    /// Price notification batching interval, `0` applies updates immediately.
    pub price_update_interval_ms: u64,
    pub sweep_interval_ms: u64,
    /// Count quoted entries in the "N of M" Group summary.
    pub show_quoted: bool,
    pub settlements_market_name: String,
    pub entry_timeout_ms: u64,
    /// Markets kept in the tree even when they hold nothing.
    pub pinned_markets: Vec<String>,
}

impl Default for BlotterConfig {
    fn default() -> Self {
        Self {
            fx_rfq_limit: DEFAULT_RFQ_LIMIT,
            xbt_rfq_limit: DEFAULT_RFQ_LIMIT,
            pm_rfq_limit: DEFAULT_RFQ_LIMIT,
            price_update_interval_ms: 0,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            show_quoted: true,
            settlements_market_name: DEFAULT_SETTLEMENTS_MARKET.to_string(),
            entry_timeout_ms: DEFAULT_ENTRY_TIMEOUT_MS,
            pinned_markets: Vec::new(),
        }
    }
}

impl BlotterConfig {
    /// Parses a JSON document, normalizing negative limits to unlimited.
    ///
    /// # Errors
    /// Returns [`BlotterError::Config`] on malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self, BlotterError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.normalize();
        config.validate()?;
        trace!("Loaded blotter config: {:?}", config);
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    /// Returns [`BlotterError::Io`] if the file cannot be read, or
    /// [`BlotterError::Config`] if its contents are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BlotterError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| BlotterError::Io {
            message: err.to_string(),
            path: Some(path.to_path_buf()),
        })?;
        Self::from_json_str(&json)
    }

    /// # Errors
    /// Returns [`BlotterError::Config`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, BlotterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn normalize(&mut self) {
        self.fx_rfq_limit = normalize_limit(self.fx_rfq_limit);
        self.xbt_rfq_limit = normalize_limit(self.xbt_rfq_limit);
        self.pm_rfq_limit = normalize_limit(self.pm_rfq_limit);
    }

    /// # Errors
    /// Returns [`BlotterError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), BlotterError> {
        if self.sweep_interval_ms == 0 {
            return Err(BlotterError::Config {
                message: "sweep_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.settlements_market_name.is_empty() {
            return Err(BlotterError::Config {
                message: "settlements_market_name must not be empty".to_string(),
            });
        }
        if AssetType::from_market_name(&self.settlements_market_name).is_some() {
            return Err(BlotterError::Config {
                message: format!(
                    "settlements_market_name '{}' collides with an asset-class market",
                    self.settlements_market_name
                ),
            });
        }
        Ok(())
    }

    pub fn limit_for(&self, asset_type: AssetType) -> i32 {
        match asset_type {
            AssetType::SpotFx => self.fx_rfq_limit,
            AssetType::SpotXbt => self.xbt_rfq_limit,
            AssetType::PrivateMarket => self.pm_rfq_limit,
        }
    }

    pub fn with_limit(mut self, asset_type: AssetType, limit: i32) -> Self {
        let limit = normalize_limit(limit);
        match asset_type {
            AssetType::SpotFx => self.fx_rfq_limit = limit,
            AssetType::SpotXbt => self.xbt_rfq_limit = limit,
            AssetType::PrivateMarket => self.pm_rfq_limit = limit,
        }
        self
    }

    pub fn with_price_update_interval(mut self, interval_ms: u64) -> Self {
        self.price_update_interval_ms = interval_ms;
        self
    }

    pub fn with_sweep_interval(mut self, interval_ms: u64) -> Self {
        self.sweep_interval_ms = interval_ms;
        self
    }

    pub fn with_show_quoted(mut self, show_quoted: bool) -> Self {
        self.show_quoted = show_quoted;
        self
    }

    pub fn with_pinned_market(mut self, name: impl Into<String>) -> Self {
        self.pinned_markets.push(name.into());
        self
    }

    pub fn is_pinned(&self, market: &str) -> bool {
        self.pinned_markets.iter().any(|name| name == market)
    }

    /// How the Market of `asset_type` is created on first insertion.
    pub fn market_spec(&self, asset_type: AssetType) -> MarketSpec<'_> {
        let name = asset_type.market_name();
        MarketSpec {
            name,
            limit: self.limit_for(asset_type),
            pinned: self.is_pinned(name),
        }
    }

    /// The reserved settlements bucket never limits visibility.
    pub fn settlements_spec(&self) -> MarketSpec<'_> {
        MarketSpec {
            name: &self.settlements_market_name,
            limit: -1,
            pinned: self.is_pinned(&self.settlements_market_name),
        }
    }
}
