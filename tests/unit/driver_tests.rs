//! Tests for the tokio driver loop.

use crate::common::{EURUSD, TestSettlement, fx_request};
use rfq_blotter::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn recording_listener() -> (ChangeListener, Arc<Mutex<Vec<ChangeEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let listener: ChangeListener = Arc::new(move |event: &ChangeEvent| {
        if let Ok(mut events) = sink.lock() {
            events.push(event.clone());
        }
    });
    (listener, events)
}

fn recorded(events: &Arc<Mutex<Vec<ChangeEvent>>>) -> Vec<ChangeEvent> {
    events.lock().map(|events| events.clone()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn driver_applies_commands_in_order() {
    let (listener, events) = recording_listener();
    let (driver, handle) = BlotterDriver::new(BlotterConfig::default());
    let task = driver.with_listener(listener).spawn();

    assert!(handle.new_quote_request(fx_request("r1", EURUSD)).is_ok());
    assert!(
        handle
            .quote_replied(QuoteReply::new("r1", Side::Buy, 1.1, 1.2))
            .is_ok()
    );
    assert!(handle.new_quote_request(fx_request("r2", EURUSD)).is_ok());
    drop(handle);

    let blotter = task.await;
    assert!(blotter.is_ok());
    let blotter = blotter.unwrap_or_else(|_| panic!("driver task"));

    assert_eq!(blotter.tree().entry_count(), 2);
    assert_eq!(
        blotter.quote_request_by_id("r1").map(|r| r.status),
        Some(QuoteReqStatus::Replied)
    );

    let events = recorded(&events);
    assert_eq!(events.first(), Some(&ChangeEvent::inserted(ParentScope::Root, 0)));
    assert!(events.contains(&ChangeEvent::StatusChanged {
        request_id: "r1".to_string(),
        status: QuoteReqStatus::Replied,
    }));
}

#[tokio::test]
async fn send_after_stop_fails() {
    let (driver, handle) = BlotterDriver::new(BlotterConfig::default());
    let task = driver.spawn();

    task.abort();
    let _ = task.await;

    assert!(handle.is_closed());
    assert!(matches!(handle.clear(), Err(BlotterError::DriverStopped)));
}

#[tokio::test]
async fn settlement_signal_is_swept_by_the_driver() {
    let config = BlotterConfig::default().with_sweep_interval(10);
    let (driver, handle) = BlotterDriver::new(config);
    let task = driver.spawn();

    let container = TestSettlement::new("s1");
    assert!(handle.settlement_added(container.clone()).is_ok());

    let mut notifier = None;
    for _ in 0..100 {
        notifier = container.notifier();
        if notifier.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let notifier = notifier.unwrap_or_else(|| panic!("container never bound"));
    notifier.failed();

    for _ in 0..100 {
        if container.is_deactivated() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(handle);

    let blotter = task.await;
    assert!(blotter.is_ok());
    let blotter = blotter.unwrap_or_else(|_| panic!("driver task"));

    assert!(container.is_deactivated());
    assert!(blotter.rfq_by_id("s1").is_none());
    assert_eq!(blotter.settlement_counters().failed, 1);
    assert!(blotter.tree().is_empty());
}

#[tokio::test]
async fn batched_prices_are_flushed_on_the_timer() {
    let (listener, events) = recording_listener();
    let (driver, handle) = BlotterDriver::new(BlotterConfig::default());
    let task = driver.with_listener(listener).spawn();

    assert!(handle.new_quote_request(fx_request("r1", EURUSD)).is_ok());
    assert!(handle.set_price_update_interval(10).is_ok());
    assert!(handle.security_price_update(EURUSD, Some(1.10), None).is_ok());
    assert!(handle.security_price_update(EURUSD, Some(1.12), None).is_ok());

    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(handle);

    let blotter = task.await;
    assert!(blotter.is_ok());
    let blotter = blotter.unwrap_or_else(|_| panic!("driver task"));

    assert_eq!(blotter.price_update_interval_ms(), 10);
    assert_eq!(blotter.rfq_by_id("r1").map(|r| r.indicative_px), Some(1.12));

    let updates = recorded(&events)
        .into_iter()
        .filter(|event| {
            matches!(event, ChangeEvent::Updated { columns, .. } if columns.contains(Columns::INDIC_PX))
        })
        .count();
    assert!(updates >= 1);
}

#[tokio::test]
async fn driver_keeps_an_existing_blotter() {
    let mut blotter = Blotter::default();
    blotter.on_new_quote_request(fx_request("r1", EURUSD));

    let (driver, handle) = BlotterDriver::with_blotter(blotter);
    let task = driver.spawn();
    assert!(handle.quote_rejected("r1", "closed").is_ok());
    drop(handle);

    let blotter = task.await;
    assert!(blotter.is_ok());
    let blotter = blotter.unwrap_or_else(|_| panic!("driver task"));
    assert!(blotter.tree().is_empty());
}
