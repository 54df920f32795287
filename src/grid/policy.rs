//! Regime-aware ladder shaping

use log::debug;
use rust_decimal::Decimal;

use super::config::{GridConfig, PolicyKind};
use super::types::{LadderPair, Regime};

/// Applies the configured [`PolicyKind`] to a pair of raw ladders
///
/// Shaping only ever removes rungs or shrinks quantities.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementPolicy;

impl PlacementPolicy {
    pub fn shape(ladders: &LadderPair, regime: Regime, config: &GridConfig) -> LadderPair {
        match config.policy.name {
            PolicyKind::ThrottledCounter => Self::throttled_counter(ladders, regime, config),
            PolicyKind::CoreAndScalp => Self::core_and_scalp(ladders, regime, config),
        }
    }

    fn counter_scale(config: &GridConfig) -> Decimal {
        config.policy.counter_qty_scale.min(Decimal::ONE).max(Decimal::ZERO)
    }

    /// Counter-trend side keeps `counter_levels` rungs at reduced size
    fn throttled_counter(ladders: &LadderPair, regime: Regime, config: &GridConfig) -> LadderPair {
        let Some(counter) = regime.counter_side() else {
            return ladders.clone();
        };

        let depth = config.policy.counter_levels as usize;
        let shaped = ladders
            .side(counter)
            .truncated(depth)
            .scaled(Self::counter_scale(config));

        debug!(
            "{}: {:?} side cut to {} rungs in {:?} regime",
            config.policy.name.as_str(),
            counter,
            shaped.len(),
            regime
        );

        ladders.clone().with_side(shaped)
    }

    /// Both sides cut to `core_levels`; counter-trend side also reduced when trending
    fn core_and_scalp(ladders: &LadderPair, regime: Regime, config: &GridConfig) -> LadderPair {
        let depth = config.policy.core_levels as usize;
        let mut shaped = LadderPair::new(ladders.long.truncated(depth), ladders.short.truncated(depth));

        if let Some(counter) = regime.counter_side() {
            let reduced = shaped.side(counter).scaled(Self::counter_scale(config));
            shaped = shaped.with_side(reduced);
        }

        debug!(
            "{}: depth {} in {:?} regime ({} long, {} short)",
            config.policy.name.as_str(),
            depth,
            regime,
            shaped.long.len(),
            shaped.short.len()
        );

        shaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::engine::GridEngine;
    use crate::grid::types::Side;
    use rust_decimal_macros::dec;

    fn config() -> GridConfig {
        GridConfig::new(dec!(100), 3, dec!(1), dec!(1))
    }

    #[test]
    fn test_throttled_counter_in_uptrend() {
        let config = config().with_counter_throttle(1, dec!(0.5));
        let raw = GridEngine::build_ladders(dec!(100), &config, Regime::Up);
        let shaped = PlacementPolicy::shape(&raw, Regime::Up, &config);

        assert_eq!(shaped.long, raw.long);
        assert_eq!(shaped.short.prices(), vec![dec!(101)]);
        assert_eq!(shaped.short.quantities(), vec![dec!(0.5)]);
    }

    #[test]
    fn test_throttled_counter_in_downtrend() {
        let config = config().with_counter_throttle(2, dec!(0.25));
        let raw = GridEngine::build_ladders(dec!(100), &config, Regime::Down);
        let shaped = PlacementPolicy::shape(&raw, Regime::Down, &config);

        assert_eq!(shaped.short, raw.short);
        assert_eq!(shaped.long.prices(), vec![dec!(99), dec!(98)]);
        assert!(shaped.long.rungs.iter().all(|r| r.qty == dec!(0.25)));
    }

    #[test]
    fn test_sideways_untouched_by_throttled_counter() {
        let config = config().with_counter_throttle(1, dec!(0.5));
        let raw = GridEngine::build_ladders(dec!(100), &config, Regime::Sideways);
        assert_eq!(PlacementPolicy::shape(&raw, Regime::Sideways, &config), raw);
    }

    #[test]
    fn test_core_and_scalp() {
        let config = GridConfig::new(dec!(100), 5, dec!(1), dec!(1))
            .with_policy(PolicyKind::CoreAndScalp)
            .with_core_levels(2)
            .with_counter_throttle(1, dec!(0.5));
        let raw = GridEngine::build_ladders(dec!(100), &config, Regime::Up);

        let shaped = PlacementPolicy::shape(&raw, Regime::Up, &config);
        assert_eq!(shaped.long.prices(), vec![dec!(99), dec!(98)]);
        assert_eq!(shaped.long.quantities(), vec![dec!(1), dec!(1)]);
        assert_eq!(shaped.short.prices(), vec![dec!(101), dec!(102)]);
        assert_eq!(shaped.short.quantities(), vec![dec!(0.5), dec!(0.5)]);

        let flat = PlacementPolicy::shape(&raw, Regime::Sideways, &config);
        assert_eq!(flat.long.len(), 2);
        assert_eq!(flat.short.quantities(), vec![dec!(1), dec!(1)]);
    }

    #[test]
    fn test_policies_differ() {
        let throttled = GridConfig::new(dec!(100), 5, dec!(1), dec!(1.2));
        let core = throttled.clone().with_policy(PolicyKind::CoreAndScalp);
        let raw = GridEngine::build_ladders(dec!(100), &throttled, Regime::Up);

        let a = PlacementPolicy::shape(&raw, Regime::Up, &throttled);
        let b = PlacementPolicy::shape(&raw, Regime::Up, &core);
        assert_ne!(a, b);
        assert_eq!(a.side(Side::Long).len(), 5);
        assert_eq!(b.side(Side::Long).len(), 3);
    }

    #[test]
    fn test_shape_never_grows() {
        let config = GridConfig::new(dec!(30), 6, dec!(0.3), dec!(1.5)).with_counter_throttle(10, dec!(1));
        let raw = GridEngine::build_ladders(dec!(2500), &config, Regime::Down);

        for kind in [PolicyKind::ThrottledCounter, PolicyKind::CoreAndScalp] {
            let config = config.clone().with_policy(kind);
            for regime in [Regime::Up, Regime::Down, Regime::Sideways] {
                let shaped = PlacementPolicy::shape(&raw, regime, &config);
                for rung in shaped.rungs() {
                    let original = raw.side(rung.side).get(rung.level).unwrap();
                    assert!(rung.qty <= original.qty);
                    assert_eq!(rung.price, original.price);
                }
            }
        }
    }
}
