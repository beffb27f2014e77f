//! Drives a blotter through a short RFQ session on a tokio runtime.
//!
//! Requests arrive with random ids, one is quoted, one is withdrawn by the
//! requestor and the rest expire. Every change event is logged.

use rfq_blotter::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const SECURITIES: [&str; 3] = ["EUR/USD", "GBP/USD", "USD/JPY"];

fn request(security: &str, expires_in_ms: u64) -> QuoteRequest {
    QuoteRequest::new(
        Uuid::new_v4().to_string(),
        security,
        "USD",
        Side::Buy,
        5_000_000.0,
        AssetType::SpotFx,
    )
    .with_party("ACME Capital")
    .with_expiration(current_time_millis() + expires_in_ms, 0)
}

#[tokio::main]
async fn main() -> Result<(), BlotterError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = BlotterConfig::from_json_str(
        r#"{"fx_rfq_limit": 2, "price_update_interval_ms": 100, "sweep_interval_ms": 250}"#,
    )?;
    let listener: ChangeListener = Arc::new(|event: &ChangeEvent| info!("{:?}", event));
    let (driver, handle) = BlotterDriver::new(config);
    let task = driver.with_listener(listener).spawn();

    let mut ids = Vec::new();
    for (i, security) in SECURITIES.iter().cycle().take(6).enumerate() {
        let request = request(security, 1_000 + 200 * i as u64);
        ids.push(request.id.clone());
        handle.new_quote_request(request)?;
    }

    handle.security_price_update("EUR/USD", Some(1.0842), Some(1.0845))?;
    handle.security_price_update("EUR/USD", Some(1.0843), None)?;

    if let Some(id) = ids.first() {
        handle.quote_replied(QuoteReply::new(id.clone(), Side::Buy, 1.0841, 1.0846))?;
        handle.best_quote_price(id.clone(), 1.0841, true)?;
    }
    if let Some(id) = ids.get(1) {
        handle.quote_req_cancelled(id.clone(), true)?;
    }
    handle.set_group_limit(LimitTarget::group("Spot FX", "GBP/USD"), -1)?;

    tokio::time::sleep(Duration::from_secs(3)).await;
    drop(handle);

    let blotter = match task.await {
        Ok(blotter) => blotter,
        Err(e) => {
            warn!("Driver task failed: {}", e);
            return Err(BlotterError::DriverStopped);
        }
    };

    info!(
        "Session over: {} markets, {} entries left",
        blotter.tree().market_count(),
        blotter.tree().entry_count()
    );
    for handle in blotter.tree().request_entries() {
        if let Some(rfq) = blotter.entry(handle) {
            info!("{}", serde_json::to_string(rfq)?);
        }
    }
    Ok(())
}
