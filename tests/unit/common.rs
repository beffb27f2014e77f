//! Fixtures shared by the integration tests.

use rfq_blotter::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub const FX: &str = "Spot FX";
pub const EURUSD: &str = "EUR/USD";

pub fn fx_request(id: &str, security: &str) -> QuoteRequest {
    QuoteRequest::new(id, security, "USD", Side::Buy, 1_000_000.0, AssetType::SpotFx)
}

/// Settlement container driven by the test.
#[derive(Default)]
pub struct TestSettlement {
    id: String,
    time_left: AtomicI64,
    deactivated: AtomicBool,
    notifier: Mutex<Option<SettlementNotifier>>,
}

impl TestSettlement {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            time_left: AtomicI64::new(60_000),
            ..Self::default()
        })
    }

    pub fn notifier(&self) -> Option<SettlementNotifier> {
        self.notifier.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated.load(Ordering::SeqCst)
    }
}

impl SettlementContainer for TestSettlement {
    fn id(&self) -> &str {
        &self.id
    }

    fn security(&self) -> &str {
        "EUR/USD"
    }

    fn product(&self) -> &str {
        "EUR"
    }

    fn side(&self) -> Side {
        Side::Buy
    }

    fn quantity(&self) -> f64 {
        250_000.0
    }

    fn price(&self) -> f64 {
        1.0852
    }

    fn asset_type(&self) -> AssetType {
        AssetType::SpotFx
    }

    fn time_left_ms(&self) -> i64 {
        self.time_left.load(Ordering::SeqCst)
    }

    fn deactivate(&self) {
        self.deactivated.store(true, Ordering::SeqCst);
    }

    fn bind(&self, notifier: SettlementNotifier) {
        if let Ok(mut guard) = self.notifier.lock() {
            *guard = Some(notifier);
        }
    }
}
