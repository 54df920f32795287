use chrono::{DateTime, Duration, TimeZone, Utc};
use hedge_grid::grid::{
    Bar, FundingObservation, GridConfig, GridEngine, GridPipeline, InstrumentPrecision,
    InstrumentRegistry, IntentAction, LiveOrder, PlacementPolicy, Regime, RegimeConfig, Side,
};
use hedge_grid::Settings;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn fast_regime() -> RegimeConfig {
    RegimeConfig::default()
        .with_trend_windows(3, 6)
        .with_indicator_windows(3, 3)
}

fn flat_config() -> GridConfig {
    GridConfig::new(dec!(100), 3, dec!(1), dec!(1)).with_regime(fast_regime())
}

fn mirror(out_ladders: &hedge_grid::LadderPair, generation: u64) -> Vec<LiveOrder> {
    out_ladders
        .rungs()
        .map(|r| LiveOrder::from_rung(r, generation))
        .collect()
}

#[test]
fn test_flat_grid_end_to_end() {
    let mut pipeline = GridPipeline::new("BTC", flat_config(), InstrumentPrecision::default()).unwrap();
    let out = pipeline.on_bar(&Bar::from_close(dec!(100), t0()), Decimal::ZERO, &[], t0());

    assert_eq!(out.ladders.long.prices(), vec![dec!(99), dec!(98), dec!(97)]);
    assert_eq!(out.ladders.short.prices(), vec![dec!(101), dec!(102), dec!(103)]);
    assert!(out.ladders.rungs().all(|r| r.qty == dec!(1)));
    assert_eq!(out.intents.len(), 6);
}

#[test]
fn test_uptrend_throttles_short_side() {
    let config = GridConfig::new(dec!(100), 3, dec!(1), dec!(1)).with_counter_throttle(1, dec!(0.5));
    let raw = GridEngine::build_ladders(dec!(100), &config, Regime::Up);
    let shaped = PlacementPolicy::shape(&raw, Regime::Up, &config);

    assert_eq!(shaped.long, raw.long);
    assert_eq!(shaped.short.len(), 1);
    assert_eq!(shaped.short.rungs[0].price, dec!(101));
    assert_eq!(shaped.short.rungs[0].qty, dec!(0.5));
}

#[test]
fn test_detected_uptrend_flows_through_pipeline() {
    let config = flat_config().with_counter_throttle(1, dec!(0.5));
    let mut pipeline = GridPipeline::new("ETH", config, InstrumentPrecision::default()).unwrap();

    let mut center = Decimal::ZERO;
    let mut last = None;
    for i in 0..20 {
        let ts = t0() + Duration::minutes(i);
        let bar = Bar::from_close(dec!(100) + Decimal::from(i * 2), ts);
        let out = pipeline.on_bar(&bar, center, &[], ts);
        center = out.center;
        last = Some(out);
    }

    let out = last.unwrap();
    assert!(out.is_warm);
    assert_eq!(out.regime, Regime::Up);
    assert_eq!(out.center, dec!(138));
    assert_eq!(out.ladders.long.len(), 3);
    assert_eq!(out.ladders.short.prices(), vec![dec!(139.38)]);
    assert_eq!(out.ladders.short.quantities(), vec![dec!(0.5)]);
}

#[test]
fn test_hydrated_orders_are_not_duplicated() {
    let mut pipeline = GridPipeline::new("BTC", flat_config(), InstrumentPrecision::default()).unwrap();
    // orders left resting by a previous session
    let expected = GridEngine::build_ladders(dec!(100), &flat_config(), Regime::Sideways);
    let live = mirror(&expected, 0);

    let out = pipeline.on_bar(&Bar::from_close(dec!(100), t0()), Decimal::ZERO, &live, t0());
    assert!(out.recentered);
    assert!(out.intents.is_empty());
}

#[test]
fn test_recenter_replaces_with_new_generation() {
    let mut pipeline = GridPipeline::new("BTC", flat_config(), InstrumentPrecision::default()).unwrap();
    let first = pipeline.on_bar(&Bar::from_close(dec!(100), t0()), Decimal::ZERO, &[], t0());
    let live = mirror(&first.ladders, pipeline.generation());

    let t1 = t0() + Duration::minutes(1);
    let out = pipeline.on_bar(&Bar::from_close(dec!(103), t1), first.center, &live, t1);

    assert!(out.recentered);
    assert_eq!(out.center, dec!(103));
    assert_eq!(out.intents.len(), 6);
    for intent in &out.intents {
        assert_eq!(intent.action, IntentAction::Replace);
        assert!(intent.derived_id.ends_with("-2"));
        assert!(intent.live_id.as_deref().unwrap().ends_with("-1"));
    }
}

#[test]
fn test_out_of_order_bars_leave_grid_alone() {
    let mut pipeline = GridPipeline::new("BTC", flat_config(), InstrumentPrecision::default()).unwrap();
    let t1 = t0() + Duration::minutes(1);
    pipeline.on_bar(&Bar::from_close(dec!(100), t0()), Decimal::ZERO, &[], t0());
    let current = pipeline.on_bar(&Bar::from_close(dec!(100), t1), dec!(100), &[], t1);
    let live = mirror(&current.ladders, pipeline.generation());

    let late = pipeline.on_bar(&Bar::from_close(dec!(150), t0()), current.center, &live, t1);
    assert!(!late.recentered);
    assert_eq!(late.center, dec!(100));
    assert!(late.intents.is_empty());

    let repeated = pipeline.on_bar(&Bar::from_close(dec!(150), t1), current.center, &live, t1);
    assert!(!repeated.recentered);
    assert_eq!(repeated.center, dec!(100));
    assert!(repeated.intents.is_empty());

    assert_eq!(pipeline.generation(), 1);
    assert_eq!(pipeline.detector().state().observations, 2);

    // the next in-order bar diffs against the untouched live grid
    let t2 = t1 + Duration::minutes(1);
    let next = pipeline.on_bar(&Bar::from_close(dec!(100.2), t2), current.center, &live, t2);
    assert!(next.intents.is_empty());
}

#[test]
fn test_funding_throttle_in_cycle() {
    let mut pipeline = GridPipeline::new("BTC", flat_config(), InstrumentPrecision::default()).unwrap();
    pipeline.on_funding(&FundingObservation::new(dec!(0.002), t0() + Duration::hours(1)));

    let out = pipeline.on_bar(&Bar::from_close(dec!(100), t0()), Decimal::ZERO, &[], t0());
    let funding = out.funding.unwrap();

    assert_eq!(funding.paying_side, Side::Long);
    assert!(funding.is_throttling());
    // 5 / 17.5 of 1, floored to the 0.001 step
    assert!(out.ladders.long.rungs.iter().all(|r| r.qty == dec!(0.285)));
    assert!(out.ladders.short.rungs.iter().all(|r| r.qty == dec!(1)));
}

#[test]
fn test_registry_keeps_instruments_independent() {
    let settings = Settings::from_toml_str(
        r#"
        [[instruments]]
        symbol = "BTC"
        [instruments.precision]
        tick_size = "0.5"
        step_size = "0.001"
        [instruments.grid]
        step_bps = "20"
        levels_long = 2
        levels_short = 2
        base_qty = "0.01"

        [[instruments]]
        symbol = "ETH"
        [instruments.grid]
        step_bps = "50"
        levels_long = 4
        levels_short = 4
        base_qty = "0.1"
        "#,
    )
    .unwrap();
    let mut registry = InstrumentRegistry::from_settings(&settings).unwrap();
    assert_eq!(registry.symbols(), vec!["BTC", "ETH"]);

    let btc = registry
        .get_mut("BTC")
        .unwrap()
        .on_bar(&Bar::from_close(dec!(65000), t0()), Decimal::ZERO, &[], t0());
    assert_eq!(btc.ladders.long.prices(), vec![dec!(64870), dec!(64740)]);

    let eth = registry.get_mut("ETH").unwrap();
    assert_eq!(eth.detector().state().observations, 0);
    assert_eq!(eth.generation(), 0);

    assert!(registry.get_mut("SOL").is_err());
}
