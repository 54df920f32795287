//! Trend regime classification with hysteresis
//!
//! One [`RegimeDetector`] is kept per instrument. It feeds every bar into a
//! fast and a slow EMA, a trend-strength (ADX) estimate and an ATR, and only
//! starts classifying once all of them are warm. Until then the reading is
//! always [`Regime::Sideways`] with `is_warm == false`.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use super::config::RegimeConfig;
use super::engine::BPS;
use super::indicators::{Atr, Ema, TrendStrength};
use super::types::{Bar, Regime};

/// Output of one detector update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegimeReading {
    pub regime: Regime,
    pub is_warm: bool,
}

/// Read-only snapshot of detector internals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorState {
    pub fast: Option<Decimal>,
    pub slow: Option<Decimal>,
    pub strength: Option<Decimal>,
    /// Average true range in price units
    pub volatility: Option<Decimal>,
    /// Average true range relative to the last close
    pub volatility_bps: Option<Decimal>,
    /// Last computed `(fast - slow) / slow` in bps
    pub spread_bps: Option<Decimal>,
    pub regime: Regime,
    pub hysteresis_bps: Decimal,
    pub is_warm: bool,
    pub observations: u64,
}

/// Apply the hysteresis transition rule
///
/// Strength below `strength_floor` forces sideways. Otherwise a trending
/// regime only flips when the spread crosses the opposite band, and sideways
/// only leaves when either band is crossed.
pub fn next_regime(
    current: Regime,
    spread_bps: Decimal,
    strength: Decimal,
    config: &RegimeConfig,
) -> Regime {
    if strength < config.strength_floor {
        return Regime::Sideways;
    }

    let band = config.hysteresis_bps;
    match current {
        Regime::Up if spread_bps < -band => Regime::Down,
        Regime::Up => Regime::Up,
        Regime::Down if spread_bps > band => Regime::Up,
        Regime::Down => Regime::Down,
        Regime::Sideways if spread_bps > band => Regime::Up,
        Regime::Sideways if spread_bps < -band => Regime::Down,
        Regime::Sideways => Regime::Sideways,
    }
}

/// Stateful per-instrument regime classifier
#[derive(Debug, Clone)]
pub struct RegimeDetector {
    config: RegimeConfig,
    fast: Ema,
    slow: Ema,
    strength: TrendStrength,
    volatility: Atr,
    regime: Regime,
    is_warm: bool,
    spread_bps: Option<Decimal>,
    last_close: Option<Decimal>,
    last_timestamp: Option<DateTime<Utc>>,
    observations: u64,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            fast: Ema::new(config.fast_window),
            slow: Ema::new(config.slow_window),
            strength: TrendStrength::new(config.strength_window),
            volatility: Atr::new(config.volatility_window),
            config,
            regime: Regime::Sideways,
            is_warm: false,
            spread_bps: None,
            last_close: None,
            last_timestamp: None,
            observations: 0,
        }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Current reading without consuming a bar
    pub fn reading(&self) -> RegimeReading {
        RegimeReading {
            regime: if self.is_warm {
                self.regime
            } else {
                Regime::Sideways
            },
            is_warm: self.is_warm,
        }
    }

    fn is_in_sequence(&self, bar: &Bar) -> bool {
        self.last_timestamp.map_or(true, |last| bar.timestamp > last)
    }

    /// Whether [`RegimeDetector::update`] would consume this bar
    ///
    /// False for bars failing [`Bar::is_valid`] and for bars not strictly
    /// after the last accepted one.
    pub fn accepts(&self, bar: &Bar) -> bool {
        bar.is_valid() && self.is_in_sequence(bar)
    }

    /// Feed one bar and reclassify
    ///
    /// Bars failing [`Bar::is_valid`] or with a timestamp not after the
    /// previous bar are ignored and the current reading is returned unchanged.
    pub fn update(&mut self, bar: &Bar) -> RegimeReading {
        if !bar.is_valid() {
            warn!(
                "Ignoring invalid bar at {} (close={}, high={}, low={})",
                bar.timestamp, bar.close, bar.high, bar.low
            );
            return self.reading();
        }
        if !self.is_in_sequence(bar) {
            warn!(
                "Ignoring out-of-order bar at {} (last bar at {:?})",
                bar.timestamp, self.last_timestamp
            );
            return self.reading();
        }

        self.last_timestamp = Some(bar.timestamp);
        self.last_close = Some(bar.close);
        self.observations += 1;

        let fast = self.fast.update(bar.close);
        let slow = self.slow.update(bar.close);
        let strength = self.strength.update(bar);
        self.volatility.update(bar);

        self.spread_bps = (fast - slow)
            .checked_div(slow)
            .and_then(|v| v.checked_mul(BPS));

        let warm = self.fast.is_warm()
            && self.slow.is_warm()
            && self.strength.is_warm()
            && self.volatility.is_warm();

        if warm && !self.is_warm {
            info!(
                "Regime detector warm after {} bars",
                self.observations
            );
        }
        self.is_warm = warm;

        if !warm {
            return self.reading();
        }

        let (Some(spread_bps), Some(strength)) = (self.spread_bps, strength) else {
            return self.reading();
        };

        let next = next_regime(self.regime, spread_bps, strength, &self.config);
        if next != self.regime {
            info!(
                "Regime changed {:?} -> {:?} (spread={} bps, strength={})",
                self.regime,
                next,
                spread_bps.round_dp(2),
                strength.round_dp(2)
            );
            self.regime = next;
        } else {
            debug!(
                "Regime {:?} held (spread={} bps, strength={})",
                self.regime,
                spread_bps.round_dp(2),
                strength.round_dp(2)
            );
        }

        self.reading()
    }

    pub fn regime(&self) -> Regime {
        self.reading().regime
    }

    pub fn is_warm(&self) -> bool {
        self.is_warm
    }

    pub fn state(&self) -> DetectorState {
        let volatility = self.volatility.value();
        let volatility_bps = match (volatility, self.last_close) {
            (Some(atr), Some(close)) if !close.is_zero() => Some(atr / close * BPS),
            _ => None,
        };

        DetectorState {
            fast: self.fast.value(),
            slow: self.slow.value(),
            strength: self.strength.value(),
            volatility,
            volatility_bps,
            spread_bps: self.spread_bps,
            regime: self.regime,
            hysteresis_bps: self.config.hysteresis_bps,
            is_warm: self.is_warm,
            observations: self.observations,
        }
    }

    /// Drop all indicator history
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}
