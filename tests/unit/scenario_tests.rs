//! End-to-end scenarios through the public blotter API.

use crate::common::{EURUSD, FX, TestSettlement, fx_request};
use rfq_blotter::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const GROUP_SCOPE: ParentScope = ParentScope::Group {
    market: 0,
    group: 0,
};

fn blotter(limit: i32) -> Blotter {
    Blotter::new(BlotterConfig::default().with_limit(AssetType::SpotFx, limit))
}

fn has_update(events: &[ChangeEvent], scope: ParentScope, row: usize, columns: Columns) -> bool {
    events.iter().any(|event| match event {
        ChangeEvent::Updated {
            parent,
            first,
            last,
            columns: touched,
        } => *parent == scope && *first <= row && row <= *last && touched.contains(columns),
        _ => false,
    })
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn first_request_builds_the_whole_path() {
    let mut blotter = blotter(5);
    let events = blotter.on_new_quote_request(fx_request("r1", EURUSD));

    assert_eq!(
        events,
        vec![
            ChangeEvent::inserted(ParentScope::Root, 0),
            ChangeEvent::inserted(ParentScope::Market(0), 0),
            ChangeEvent::inserted(GROUP_SCOPE, 0),
            ChangeEvent::InvalidateFilter,
        ]
    );
    assert!(blotter.is_visible("r1"));
    assert_eq!(blotter.market_sort_order(FX), Some(AssetType::SpotFx.sort_order()));
}

#[test]
fn duplicate_request_only_updates_status() {
    let mut blotter = blotter(5);
    blotter.on_new_quote_request(fx_request("r1", EURUSD));

    let events = blotter
        .on_new_quote_request(fx_request("r1", EURUSD).with_status(QuoteReqStatus::Replied));

    assert_eq!(blotter.tree().entry_count(), 1);
    assert!(events.iter().all(|event| !event.is_structural()));
    assert!(events.contains(&ChangeEvent::StatusChanged {
        request_id: "r1".to_string(),
        status: QuoteReqStatus::Replied,
    }));
    let request = blotter.quote_request_by_id("r1");
    assert_eq!(request.map(|r| r.status), Some(QuoteReqStatus::Replied));
}

#[test]
fn quoting_frees_a_slot_for_the_newest_hidden_entry() {
    let mut blotter = blotter(2);
    for id in ["a", "b", "c", "d"] {
        blotter.on_new_quote_request(fx_request(id, EURUSD));
    }
    assert_eq!(blotter.group_summary(FX, EURUSD).as_deref(), Some("2 of 4"));

    let events = blotter.on_quote_replied(&QuoteReply::new("a", Side::Buy, 1.1050, 1.1060));

    assert!(events.contains(&ChangeEvent::InvalidateFilter));
    assert!(has_update(&events, ParentScope::Market(0), 0, Columns::PRODUCT));
    assert!(!blotter.is_visible("a"));
    assert!(blotter.is_visible("b"));
    assert!(!blotter.is_visible("c"));
    assert!(blotter.is_visible("d"));
    assert_eq!(blotter.group_summary(FX, EURUSD).as_deref(), Some("3 of 4"));

    blotter.set_show_quoted_filter(false);
    assert_eq!(blotter.group_summary(FX, EURUSD).as_deref(), Some("2 of 4"));
    assert_eq!(blotter.has_hidden_children(FX, EURUSD), Some(true));
}

#[test]
fn pulled_quote_returns_to_pending() {
    let mut blotter = blotter(5);
    blotter.on_new_quote_request(fx_request("r1", EURUSD));
    blotter.on_quote_replied(&QuoteReply::new("r1", Side::Buy, 1.1050, 1.1060));

    let events = blotter.on_quote_notif_cancelled("r1");

    assert!(has_update(&events, GROUP_SCOPE, 0, Columns::QUOTED_PX));
    let rfq = blotter.rfq_by_id("r1");
    assert!(rfq.is_some());
    let rfq = rfq.unwrap_or_else(|| panic!("r1 tracked"));
    assert_eq!(rfq.quoted_price_text, "pulled");
    assert_eq!(rfq.quoted_px, 0.0);
    assert!(!rfq.quoted);
    assert_eq!(rfq.state, QuoteReqStatus::PendingAck);
}

#[test]
fn only_user_cancels_remove_requests() {
    let mut blotter = blotter(5);
    blotter.on_new_quote_request(fx_request("r1", EURUSD));

    assert!(blotter.on_quote_req_cancelled("r1", false).is_empty());
    assert!(blotter.rfq_by_id("r1").is_some());

    let events = blotter.on_quote_req_cancelled("r1", true);

    assert!(blotter.rfq_by_id("r1").is_none());
    assert!(events.contains(&ChangeEvent::removed(GROUP_SCOPE, 0)));
    assert!(events.contains(&ChangeEvent::removed(ParentScope::Market(0), 0)));
    assert!(events.contains(&ChangeEvent::removed(ParentScope::Root, 0)));
    assert!(blotter.tree().is_empty());
}

#[test]
fn rejection_removes_only_that_entry() {
    let mut blotter = blotter(5);
    blotter.on_new_quote_request(fx_request("r1", EURUSD));
    blotter.on_new_quote_request(fx_request("r2", EURUSD));

    let events = blotter.on_quote_rejected("r1", "unknown party");

    assert!(events.contains(&ChangeEvent::StatusChanged {
        request_id: "r1".to_string(),
        status: QuoteReqStatus::Rejected,
    }));
    assert!(events.contains(&ChangeEvent::removed(GROUP_SCOPE, 0)));
    assert_eq!(blotter.tree().entry_count(), 1);
    assert_eq!(blotter.tree().group_count(), 1);
}

#[test]
fn unknown_ids_are_absorbed() {
    let mut blotter = blotter(5);

    assert!(blotter.on_quote_notif_cancelled("ghost").is_empty());
    assert!(blotter.on_quote_rejected("ghost", "n/a").is_empty());
    assert!(blotter.on_best_quote_price("ghost", 1.0, true).is_empty());
    assert!(
        blotter
            .set_group_limit(&LimitTarget::group(FX, EURUSD), 3)
            .is_empty()
    );
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[test]
fn limit_change_refills_oldest_first() {
    let mut blotter = blotter(1);
    for id in ["a", "b", "c"] {
        blotter.on_new_quote_request(fx_request(id, EURUSD));
    }

    let events = blotter.set_group_limit(&LimitTarget::market(FX), 2);

    assert_eq!(events.last(), Some(&ChangeEvent::InvalidateFilter));
    assert!(blotter.is_visible("a"));
    assert!(blotter.is_visible("b"));
    assert!(!blotter.is_visible("c"));
}

#[test]
fn unlimited_group_shows_every_unquoted_entry() {
    let mut blotter = blotter(-1);
    for id in ["a", "b", "c"] {
        blotter.on_new_quote_request(fx_request(id, EURUSD));
    }
    blotter.on_quote_replied(&QuoteReply::new("b", Side::Buy, 1.1, 1.2));

    assert!(blotter.is_visible("a"));
    assert!(!blotter.is_visible("b"));
    assert!(blotter.is_visible("c"));
    assert_eq!(blotter.group_summary(FX, EURUSD).as_deref(), Some("3 RFQ"));
}

#[test]
fn zero_limit_hides_everything() {
    let mut blotter = blotter(0);
    blotter.on_new_quote_request(fx_request("a", EURUSD));

    assert!(!blotter.is_visible("a"));
    assert_eq!(blotter.group_summary(FX, EURUSD).as_deref(), Some("1 RFQ"));
    assert_eq!(blotter.has_hidden_children(FX, EURUSD), Some(true));
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

#[test]
fn cached_price_seeds_new_requests_and_colors_moves() {
    let mut blotter = blotter(5);
    blotter.on_security_price_update(EURUSD, Some(1.1000), Some(1.1010));
    blotter.on_new_quote_request(fx_request("r1", EURUSD));

    assert_eq!(blotter.rfq_by_id("r1").map(|r| r.indicative_px), Some(1.1000));

    let events = blotter.on_security_price_update(EURUSD, Some(1.1020), None);
    assert_eq!(
        events,
        vec![ChangeEvent::updated(GROUP_SCOPE, 0, Columns::INDIC_PX)]
    );
    assert_eq!(
        blotter.rfq_by_id("r1").map(|r| r.indicative_trend),
        Some(PriceTrend::Up)
    );

    // The offer does not apply to a buy quoted in the denominator currency.
    assert!(
        blotter
            .on_security_price_update(EURUSD, None, Some(1.0990))
            .is_empty()
    );
    assert_eq!(blotter.price_for(EURUSD, PriceKind::Offer), 1.0990);
}

#[test]
fn best_quote_colors_our_price() {
    let mut blotter = blotter(5);
    blotter.on_new_quote_request(fx_request("r1", EURUSD));
    blotter.on_quote_replied(&QuoteReply::new("r1", Side::Buy, 1.1050, 1.1060));

    let events = blotter.on_best_quote_price("r1", 1.1050, true);
    assert!(has_update(&events, GROUP_SCOPE, 0, Columns::BEST_PX));
    assert_eq!(
        blotter.rfq_by_id("r1").map(|r| r.quoted_standing),
        Some(QuoteStanding::Won)
    );

    blotter.on_best_quote_price("r1", 1.1055, false);
    assert_eq!(
        blotter.rfq_by_id("r1").map(|r| r.quoted_standing),
        Some(QuoteStanding::Lost)
    );
}

#[test]
fn batched_updates_wait_for_flush() {
    let config = BlotterConfig::default().with_price_update_interval(100);
    let mut blotter = Blotter::new(config);
    blotter.on_new_quote_request(fx_request("r1", EURUSD));
    blotter.on_new_quote_request(fx_request("r2", EURUSD));

    assert!(blotter.on_security_price_update(EURUSD, Some(1.10), None).is_empty());
    assert!(blotter.on_security_price_update(EURUSD, Some(1.11), None).is_empty());
    assert!(blotter.on_best_quote_price("r2", 1.12, false).is_empty());
    assert_eq!(blotter.price_for(EURUSD, PriceKind::Bid), 0.0);

    let events = blotter.flush_price_updates();

    assert_eq!(blotter.price_for(EURUSD, PriceKind::Bid), 1.11);
    assert_eq!(events.len(), 1);
    assert!(has_update(&events, GROUP_SCOPE, 0, Columns::INDIC_PX));
    assert!(has_update(&events, GROUP_SCOPE, 1, Columns::BEST_PX));
    assert!(blotter.flush_price_updates().is_empty());
}

// ---------------------------------------------------------------------------
// Sweeping and settlements
// ---------------------------------------------------------------------------

#[test]
fn sweep_counts_down_then_expires() {
    let now = 1_700_000_000_000;
    let mut blotter = blotter(5);
    blotter.on_new_quote_request(fx_request("r1", EURUSD).with_expiration(now + 1_000, 0));

    let events = blotter.tick(now);
    assert!(has_update(&events, GROUP_SCOPE, 0, Columns::STATUS));
    assert_eq!(
        blotter.rfq_by_id("r1").map(|r| r.status.time_left_ms),
        Some(1_000)
    );

    let events = blotter.tick(now + 1_001);
    assert!(events.contains(&ChangeEvent::removed(GROUP_SCOPE, 0)));
    assert!(blotter.tree().is_empty());
}

#[test]
fn scheduled_removal_waits_for_the_sweep() {
    let mut blotter = blotter(5);
    blotter.on_new_quote_request(fx_request("r1", EURUSD));

    blotter.schedule_removal("r1");
    blotter.schedule_removal("r1");
    assert_eq!(blotter.pending_removals(), 1);
    assert!(blotter.rfq_by_id("r1").is_some());

    blotter.tick(current_time_millis());
    assert!(blotter.rfq_by_id("r1").is_none());
    assert_eq!(blotter.pending_removals(), 0);
}

#[test]
fn completed_settlement_leaves_on_next_sweep() {
    let mut blotter = blotter(5);
    let container = TestSettlement::new("s1");

    let events = blotter.on_settlement_added(container.clone());
    assert_eq!(
        events,
        vec![
            ChangeEvent::inserted(ParentScope::Root, 0),
            ChangeEvent::inserted(ParentScope::Market(0), 0),
        ]
    );
    assert_eq!(blotter.market_sort_order("Settlements"), Some(0));

    let notifier = container.notifier();
    assert!(notifier.is_some());
    let notifier = notifier.unwrap_or_else(|| panic!("container bound"));
    notifier.completed();

    let events = blotter.tick(current_time_millis());

    assert!(events.contains(&ChangeEvent::removed(ParentScope::Market(0), 0)));
    assert!(events.contains(&ChangeEvent::removed(ParentScope::Root, 0)));
    assert_eq!(
        blotter.settlement_counters(),
        SettlementCounters {
            completed: 1,
            failed: 0
        }
    );
    assert!(container.is_deactivated());
    assert!(notifier.is_cancelled());
    assert_eq!(blotter.active_settlements(), 0);
}

#[test]
fn clear_resets_tree_but_keeps_prices() {
    let mut blotter = blotter(5);
    blotter.on_security_price_update(EURUSD, Some(1.10), Some(1.11));
    blotter.on_new_quote_request(fx_request("r1", EURUSD));
    let container = TestSettlement::new("s1");
    blotter.on_settlement_added(container.clone());

    assert_eq!(blotter.clear(), vec![ChangeEvent::Reset]);

    assert!(blotter.tree().is_empty());
    assert!(container.is_deactivated());
    assert_eq!(blotter.price_for(EURUSD, PriceKind::Bid), 1.10);

    blotter.on_new_quote_request(fx_request("r2", EURUSD));
    assert_eq!(blotter.rfq_by_id("r2").map(|r| r.indicative_px), Some(1.10));
}
