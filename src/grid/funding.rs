//! Funding-cost aware exposure throttle
//!
//! The guard remembers the latest funding observation of one instrument and,
//! when the projected cost of the paying side is too high, shrinks that
//! side's quantities. The receiving side is never touched and no quantity is
//! ever increased.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use super::config::FundingConfig;
use super::engine::BPS;
use super::types::{FundingObservation, LadderPair, Side};

/// Last funding observation, rate already clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingState {
    pub rate: Decimal,
    pub next_funding: DateTime<Utc>,
    pub window: Duration,
}

/// Projected funding cost for the paying side at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingAssessment {
    pub paying_side: Side,
    /// Projected cost in quote currency over the paying side's notional,
    /// `Decimal::MAX` when the notional itself overflows
    pub cost_quote: Decimal,
    /// Projected cost relative to the paying side's notional
    pub cost_bps: Decimal,
    /// 0 with a full window left before funding, 1 at settlement
    pub weight: Decimal,
    /// Quantity multiplier for the paying side, 1 when no throttling applies
    pub scale: Decimal,
}

impl FundingAssessment {
    pub fn is_throttling(&self) -> bool {
        self.scale < Decimal::ONE
    }
}

#[derive(Debug, Clone)]
pub struct FundingGuard {
    config: FundingConfig,
    state: Option<FundingState>,
}

impl FundingGuard {
    pub fn new(config: FundingConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn config(&self) -> &FundingConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&FundingState> {
        self.state.as_ref()
    }

    /// Record a new funding observation
    ///
    /// Rates beyond `max_abs_rate` are clamped.
    pub fn on_funding_update(&mut self, rate: Decimal, next_funding: DateTime<Utc>) {
        let cap = self.config.max_abs_rate;
        let clamped = rate.max(-cap).min(cap);
        if clamped != rate {
            warn!("Funding rate {} clamped to {}", rate, clamped);
        }

        debug!("Funding update: rate={} next={}", clamped, next_funding);
        self.state = Some(FundingState {
            rate: clamped,
            next_funding,
            window: self.config.window(),
        });
    }

    pub fn on_observation(&mut self, observation: &FundingObservation) {
        self.on_funding_update(observation.rate, observation.next_funding);
    }

    /// Weight in `[0, 1]` growing as settlement approaches
    fn proximity_weight(time_left: Duration, window: Duration) -> Decimal {
        let window_ms = window.num_milliseconds();
        if window_ms <= 0 {
            return Decimal::ONE;
        }
        let fraction = Decimal::from(time_left.num_milliseconds()) / Decimal::from(window_ms);
        Decimal::ONE - fraction.max(Decimal::ZERO).min(Decimal::ONE)
    }

    /// Project the paying side's cost at `now`
    ///
    /// `None` without an observation, with a zero rate, or when the
    /// observation is stale (its settlement is not in the future).
    pub fn assess(&self, ladders: &LadderPair, now: DateTime<Utc>) -> Option<FundingAssessment> {
        let state = self.state?;
        if state.rate.is_zero() {
            return None;
        }
        if state.next_funding <= now {
            debug!(
                "Funding observation stale (next funding {} <= now {})",
                state.next_funding, now
            );
            return None;
        }

        let paying_side = if state.rate > Decimal::ZERO {
            Side::Long
        } else {
            Side::Short
        };
        let abs_rate = state.rate.abs();
        let weight = Self::proximity_weight(state.next_funding - now, state.window);
        let Some(cost_bps) = abs_rate
            .checked_mul(BPS)
            .and_then(|v| v.checked_mul(weight))
        else {
            warn!("Funding cost overflow at rate {}, skipping assessment", state.rate);
            return None;
        };
        let cost_quote = ladders
            .side(paying_side)
            .total_notional()
            .and_then(|n| n.checked_mul(abs_rate))
            .and_then(|v| v.checked_mul(weight))
            .unwrap_or_else(|| {
                warn!("{:?} side notional overflows, reporting saturated cost", paying_side);
                Decimal::MAX
            });

        let scale = if cost_bps > self.config.max_cost_bps {
            (self.config.max_cost_bps / cost_bps).max(self.config.min_scale)
        } else {
            Decimal::ONE
        };

        Some(FundingAssessment {
            paying_side,
            cost_quote,
            cost_bps,
            weight,
            scale: scale.min(Decimal::ONE),
        })
    }

    /// Scale down the paying side when its projected cost is too high
    pub fn adjust(&self, ladders: &LadderPair, now: DateTime<Utc>) -> LadderPair {
        let Some(assessment) = self.assess(ladders, now) else {
            return ladders.clone();
        };
        if !assessment.is_throttling() {
            return ladders.clone();
        }

        info!(
            "Funding throttle: {:?} side scaled by {} (projected {} bps, {} quote)",
            assessment.paying_side,
            assessment.scale.round_dp(4),
            assessment.cost_bps.round_dp(2),
            assessment.cost_quote.round_dp(4)
        );

        let reduced = ladders
            .side(assessment.paying_side)
            .scaled(assessment.scale);
        ladders.clone().with_side(reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::config::GridConfig;
    use crate::grid::engine::GridEngine;
    use crate::grid::types::Regime;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ladders() -> LadderPair {
        let config = GridConfig::new(dec!(100), 3, dec!(1), dec!(1.5));
        GridEngine::build_ladders(dec!(100), &config, Regime::Sideways)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
    }

    fn guard() -> FundingGuard {
        // 8h window, tolerate 5 bps
        FundingGuard::new(FundingConfig::default())
    }

    #[test]
    fn test_no_observation_is_noop() {
        let raw = ladders();
        assert_eq!(guard().adjust(&raw, now()), raw);
        assert!(guard().assess(&raw, now()).is_none());
    }

    #[test]
    fn test_positive_rate_throttles_long() {
        let mut guard = guard();
        // 1 hour to funding: weight 7/8, cost = 0.002 * 10000 * 0.875 = 17.5 bps
        guard.on_funding_update(dec!(0.002), now() + Duration::hours(1));
        let raw = ladders();

        let assessment = guard.assess(&raw, now()).unwrap();
        assert_eq!(assessment.paying_side, Side::Long);
        assert_eq!(assessment.weight, dec!(0.875));
        assert_eq!(assessment.cost_bps, dec!(17.5));

        let adjusted = guard.adjust(&raw, now());
        assert_eq!(adjusted.short, raw.short);
        for (after, before) in adjusted.long.rungs.iter().zip(&raw.long.rungs) {
            assert!(after.qty < before.qty);
            assert_eq!(after.price, before.price);
        }
    }

    #[test]
    fn test_negative_rate_throttles_short() {
        let mut guard = guard();
        guard.on_funding_update(dec!(-0.003), now() + Duration::minutes(30));
        let raw = ladders();

        let adjusted = guard.adjust(&raw, now());
        assert_eq!(adjusted.long, raw.long);
        assert!(adjusted.short.total_qty() < raw.short.total_qty());
    }

    #[test]
    fn test_cheap_funding_is_noop() {
        let mut guard = guard();
        guard.on_funding_update(dec!(0.0001), now() + Duration::minutes(5));
        let raw = ladders();

        let assessment = guard.assess(&raw, now()).unwrap();
        assert!(!assessment.is_throttling());
        assert_eq!(guard.adjust(&raw, now()), raw);
    }

    #[test]
    fn test_severity_grows_toward_settlement() {
        let mut guard = guard();
        let settlement = now() + Duration::hours(4);
        guard.on_funding_update(dec!(0.005), settlement);
        let raw = ladders();

        let mut last = Decimal::ONE;
        for minutes_left in [180, 120, 60, 30, 1] {
            let at = settlement - Duration::minutes(minutes_left);
            let scale = guard.assess(&raw, at).unwrap().scale;
            assert!(scale <= last);
            last = scale;
        }
        assert!(last < Decimal::ONE);
        assert!(last >= FundingConfig::default().min_scale);
    }

    #[test]
    fn test_stale_observation_ignored() {
        let mut guard = guard();
        guard.on_funding_update(dec!(0.005), now() - Duration::minutes(1));
        let raw = ladders();
        assert!(guard.assess(&raw, now()).is_none());
        assert_eq!(guard.adjust(&raw, now()), raw);
    }

    #[test]
    fn test_notional_overflow_still_throttles() {
        // level 3 carries 1e26 units, far beyond what price * qty can hold
        let config = GridConfig::new(dec!(100), 3, dec!(1), dec!(10000000000000));
        assert!(config.validate().is_ok());
        let raw = GridEngine::build_ladders(dec!(5000), &config, Regime::Sideways);
        assert_eq!(raw.long.total_notional(), None);

        let mut guard = guard();
        guard.on_funding_update(dec!(0.001), now() + Duration::minutes(10));
        let assessment = guard.assess(&raw, now()).unwrap();
        assert_eq!(assessment.cost_quote, Decimal::MAX);
        assert!(assessment.is_throttling());

        let adjusted = guard.adjust(&raw, now());
        assert!(adjusted.long.rungs[0].qty < raw.long.rungs[0].qty);
        assert_eq!(adjusted.short, raw.short);
    }

    #[test]
    fn test_oversized_window_does_not_panic() {
        let mut guard = FundingGuard::new(FundingConfig {
            window_secs: 10_000_000_000_000_000,
            ..FundingConfig::default()
        });
        guard.on_funding_update(dec!(0.002), now() + Duration::hours(1));
        assert_eq!(guard.state().unwrap().window, Duration::MAX);

        // an hour is a vanishing share of the window, so the full weight applies
        let assessment = guard.assess(&ladders(), now()).unwrap();
        assert!(assessment.weight > dec!(0.999));
        assert!(assessment.is_throttling());
    }

    #[test]
    fn test_rate_clamped_and_min_scale() {
        let mut guard = FundingGuard::new(FundingConfig {
            min_scale: dec!(0.25),
            ..FundingConfig::default()
        });
        guard.on_funding_update(dec!(0.5), now() + Duration::seconds(1));
        assert_eq!(guard.state().unwrap().rate, dec!(0.01));

        let assessment = guard.assess(&ladders(), now()).unwrap();
        assert_eq!(assessment.scale, dec!(0.25));
    }
}
