//! Integration tests for configuration loading.

use rfq_blotter::blotter::config::{DEFAULT_RFQ_LIMIT, DEFAULT_SWEEP_INTERVAL_MS};
use rfq_blotter::prelude::*;
use std::io::Write;

// ---------------------------------------------------------------------------
// JSON text
// ---------------------------------------------------------------------------

#[test]
fn empty_document_yields_defaults() {
    let config = BlotterConfig::from_json_str("{}");
    assert!(config.is_ok());
    let config = config.unwrap_or_else(|_| panic!("config"));

    assert_eq!(config, BlotterConfig::default());
    assert_eq!(config.limit_for(AssetType::SpotXbt), DEFAULT_RFQ_LIMIT);
    assert_eq!(config.sweep_interval_ms, DEFAULT_SWEEP_INTERVAL_MS);
    assert_eq!(config.price_update_interval_ms, 0);
    assert_eq!(config.entry_timeout_ms, 30_000);
    assert!(config.show_quoted);
    assert_eq!(config.settlements_market_name, "Settlements");
}

#[test]
fn negative_limits_are_normalized() {
    let config = BlotterConfig::from_json_str(r#"{"fx_rfq_limit": -20, "pm_rfq_limit": 0}"#);
    assert!(config.is_ok());
    let config = config.unwrap_or_else(|_| panic!("config"));

    assert_eq!(config.fx_rfq_limit, -1);
    assert_eq!(config.pm_rfq_limit, 0);
}

#[test]
fn malformed_json_is_a_config_error() {
    let result = BlotterConfig::from_json_str(r#"{"fx_rfq_limit": "five"}"#);
    assert!(matches!(result, Err(BlotterError::Config { .. })));
}

#[test]
fn zero_sweep_interval_is_rejected() {
    let result = BlotterConfig::from_json_str(r#"{"sweep_interval_ms": 0}"#);
    assert!(matches!(result, Err(BlotterError::Config { .. })));
}

#[test]
fn settlements_bucket_cannot_shadow_an_asset_market() {
    let result = BlotterConfig::from_json_str(r#"{"settlements_market_name": "Spot FX"}"#);
    assert!(matches!(result, Err(BlotterError::Config { .. })));
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn loads_config_from_file() {
    let file = tempfile::NamedTempFile::new();
    assert!(file.is_ok());
    let mut file = file.unwrap_or_else(|_| panic!("tempfile"));

    let written = writeln!(
        file,
        r#"{{"xbt_rfq_limit": 2, "price_update_interval_ms": 250, "pinned_markets": ["Spot XBT"]}}"#
    );
    assert!(written.is_ok());

    let config = BlotterConfig::from_file(file.path());
    assert!(config.is_ok());
    let config = config.unwrap_or_else(|_| panic!("config"));

    assert_eq!(config.xbt_rfq_limit, 2);
    assert_eq!(config.price_update_interval_ms, 250);
    assert!(config.is_pinned("Spot XBT"));
    assert!(!config.is_pinned("Spot FX"));
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempfile::tempdir();
    assert!(dir.is_ok());
    let dir = dir.unwrap_or_else(|_| panic!("tempdir"));
    let path = dir.path().join("absent.json");

    match BlotterConfig::from_file(&path) {
        Err(BlotterError::Io { path: Some(p), .. }) => assert_eq!(p, path),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn serialized_config_loads_back() {
    let config = BlotterConfig::default()
        .with_limit(AssetType::PrivateMarket, 3)
        .with_show_quoted(false)
        .with_pinned_market("Settlements");

    let json = config.to_json_string();
    assert!(json.is_ok());
    let json = json.unwrap_or_else(|_| panic!("json"));

    let loaded = BlotterConfig::from_json_str(&json);
    assert!(loaded.is_ok());
    assert_eq!(loaded.unwrap_or_else(|_| panic!("config")), config);
}

#[test]
fn configured_limits_apply_to_new_markets() {
    let config = BlotterConfig::from_json_str(r#"{"fx_rfq_limit": 1, "show_quoted": false}"#);
    assert!(config.is_ok());
    let mut blotter = Blotter::new(config.unwrap_or_else(|_| panic!("config")));

    for id in ["a", "b", "c"] {
        blotter.on_new_quote_request(crate::common::fx_request(id, "EUR/USD"));
    }

    assert_eq!(
        blotter.group_summary("Spot FX", "EUR/USD").as_deref(),
        Some("1 of 3")
    );
    assert!(!blotter.show_quoted());
}
