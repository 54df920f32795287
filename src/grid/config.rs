//! Grid configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::errors::{GridError, GridResult};
use super::types::Side;

/// Tick/step/notional rules of one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentPrecision {
    /// Minimum price increment
    pub tick_size: Decimal,
    /// Minimum quantity increment
    pub step_size: Decimal,
    /// Smallest accepted order value in quote currency
    #[serde(default)]
    pub min_notional: Decimal,
}

impl InstrumentPrecision {
    pub fn new(tick_size: Decimal, step_size: Decimal, min_notional: Decimal) -> Self {
        Self {
            tick_size,
            step_size,
            min_notional,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.tick_size <= Decimal::ZERO {
            return Err(GridError::InvalidConfig("tick_size must be positive".into()));
        }
        if self.step_size <= Decimal::ZERO {
            return Err(GridError::InvalidConfig("step_size must be positive".into()));
        }
        if self.min_notional < Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "min_notional cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

impl Default for InstrumentPrecision {
    fn default() -> Self {
        Self::new(dec!(0.01), dec!(0.001), Decimal::ZERO)
    }
}

/// Trend detector windows and thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Fast EMA length in bars
    #[serde(default = "default_fast_window")]
    pub fast_window: u32,

    /// Slow EMA length in bars
    #[serde(default = "default_slow_window")]
    pub slow_window: u32,

    /// Trend-strength (ADX) smoothing length
    #[serde(default = "default_strength_window")]
    pub strength_window: u32,

    /// Volatility (ATR) smoothing length
    #[serde(default = "default_volatility_window")]
    pub volatility_window: u32,

    /// Below this strength the market is treated as sideways
    #[serde(default = "default_strength_floor")]
    pub strength_floor: Decimal,

    /// EMA spread (bps) that must be crossed before switching regime
    #[serde(default = "default_hysteresis_bps")]
    pub hysteresis_bps: Decimal,
}

fn default_fast_window() -> u32 {
    20
}

fn default_slow_window() -> u32 {
    50
}

fn default_strength_window() -> u32 {
    14
}

fn default_volatility_window() -> u32 {
    14
}

fn default_strength_floor() -> Decimal {
    dec!(20)
}

fn default_hysteresis_bps() -> Decimal {
    dec!(50)
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            fast_window: default_fast_window(),
            slow_window: default_slow_window(),
            strength_window: default_strength_window(),
            volatility_window: default_volatility_window(),
            strength_floor: default_strength_floor(),
            hysteresis_bps: default_hysteresis_bps(),
        }
    }
}

impl RegimeConfig {
    /// Builder: set EMA windows
    pub fn with_trend_windows(mut self, fast: u32, slow: u32) -> Self {
        self.fast_window = fast;
        self.slow_window = slow;
        self
    }

    /// Builder: set strength and volatility windows
    pub fn with_indicator_windows(mut self, strength: u32, volatility: u32) -> Self {
        self.strength_window = strength;
        self.volatility_window = volatility;
        self
    }

    /// Builder: set strength floor
    pub fn with_strength_floor(mut self, floor: Decimal) -> Self {
        self.strength_floor = floor;
        self
    }

    /// Builder: set hysteresis band
    pub fn with_hysteresis_bps(mut self, bps: Decimal) -> Self {
        self.hysteresis_bps = bps;
        self
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.fast_window == 0
            || self.slow_window == 0
            || self.strength_window == 0
            || self.volatility_window == 0
        {
            return Err(GridError::InvalidConfig(
                "indicator windows must be at least 1".into(),
            ));
        }
        if self.fast_window >= self.slow_window {
            return Err(GridError::InvalidConfig(
                "fast_window must be less than slow_window".into(),
            ));
        }
        if self.strength_floor < Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "strength_floor cannot be negative".into(),
            ));
        }
        if self.hysteresis_bps < Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "hysteresis_bps cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Order shaping strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Keep the nearest counter-trend rungs at reduced size
    #[default]
    ThrottledCounter,
    /// Shallow common depth on both sides, reduced counter-trend size
    CoreAndScalp,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::ThrottledCounter => "throttled-counter",
            PolicyKind::CoreAndScalp => "core-and-scalp",
        }
    }
}

/// Regime-aware shaping parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub name: PolicyKind,

    /// Counter-trend rungs kept by throttled-counter
    #[serde(default = "default_counter_levels")]
    pub counter_levels: u32,

    /// Quantity multiplier for counter-trend rungs (<= 1)
    #[serde(default = "default_counter_qty_scale")]
    pub counter_qty_scale: Decimal,

    /// Common depth used by core-and-scalp
    #[serde(default = "default_core_levels")]
    pub core_levels: u32,
}

fn default_counter_levels() -> u32 {
    2
}

fn default_counter_qty_scale() -> Decimal {
    dec!(0.5)
}

fn default_core_levels() -> u32 {
    3
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            name: PolicyKind::default(),
            counter_levels: default_counter_levels(),
            counter_qty_scale: default_counter_qty_scale(),
            core_levels: default_core_levels(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> GridResult<()> {
        if self.counter_levels == 0 {
            return Err(GridError::InvalidConfig(
                "counter_levels must be at least 1".into(),
            ));
        }
        if self.core_levels == 0 {
            return Err(GridError::InvalidConfig(
                "core_levels must be at least 1".into(),
            ));
        }
        if self.counter_qty_scale <= Decimal::ZERO || self.counter_qty_scale > Decimal::ONE {
            return Err(GridError::InvalidConfig(
                "counter_qty_scale must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Funding-cost throttle parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Forward window used to project funding cost
    #[serde(default = "default_funding_window_secs")]
    pub window_secs: u64,

    /// Projected cost (bps of paying-side notional) tolerated without throttling
    #[serde(default = "default_max_cost_bps")]
    pub max_cost_bps: Decimal,

    /// Observed rates are clamped to +/- this value
    #[serde(default = "default_max_abs_rate")]
    pub max_abs_rate: Decimal,

    /// Lower bound of the applied quantity multiplier
    #[serde(default = "default_min_scale")]
    pub min_scale: Decimal,
}

/// Longest accepted funding projection window (7 days)
pub const MAX_FUNDING_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

fn default_funding_window_secs() -> u64 {
    8 * 60 * 60
}

fn default_max_cost_bps() -> Decimal {
    dec!(5)
}

fn default_max_abs_rate() -> Decimal {
    dec!(0.01)
}

fn default_min_scale() -> Decimal {
    dec!(0.1)
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            window_secs: default_funding_window_secs(),
            max_cost_bps: default_max_cost_bps(),
            max_abs_rate: default_max_abs_rate(),
            min_scale: default_min_scale(),
        }
    }
}

impl FundingConfig {
    /// Forward window as a duration, saturating at `Duration::MAX`
    pub fn window(&self) -> chrono::Duration {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.window_secs == 0 {
            return Err(GridError::InvalidConfig(
                "funding window_secs must be positive".into(),
            ));
        }
        if self.window_secs > MAX_FUNDING_WINDOW_SECS {
            return Err(GridError::InvalidConfig(format!(
                "funding window_secs cannot exceed {}",
                MAX_FUNDING_WINDOW_SECS
            )));
        }
        if self.max_cost_bps < Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "max_cost_bps cannot be negative".into(),
            ));
        }
        if self.max_abs_rate <= Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "max_abs_rate must be positive".into(),
            ));
        }
        if self.min_scale < Decimal::ZERO || self.min_scale > Decimal::ONE {
            return Err(GridError::InvalidConfig(
                "min_scale must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Tolerance bands used by the order diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Price deviation (bps of desired price) tolerated before replacing
    #[serde(default = "default_price_tolerance_bps")]
    pub price_tolerance_bps: Decimal,

    /// Quantity deviation (percent of desired qty) tolerated before replacing
    #[serde(default = "default_qty_tolerance_pct")]
    pub qty_tolerance_pct: Decimal,
}

fn default_price_tolerance_bps() -> Decimal {
    dec!(1)
}

fn default_qty_tolerance_pct() -> Decimal {
    dec!(1)
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            price_tolerance_bps: default_price_tolerance_bps(),
            qty_tolerance_pct: default_qty_tolerance_pct(),
        }
    }
}

impl DiffConfig {
    pub fn new(price_tolerance_bps: Decimal, qty_tolerance_pct: Decimal) -> Self {
        Self {
            price_tolerance_bps,
            qty_tolerance_pct,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.price_tolerance_bps < Decimal::ZERO || self.qty_tolerance_pct < Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "diff tolerances cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Hedge grid configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Distance between levels in basis points of the center
    pub step_bps: Decimal,

    /// Rungs on the long (buy) side
    pub levels_long: u32,

    /// Rungs on the short (sell) side
    pub levels_short: u32,

    /// Quantity of the level-1 rung
    pub base_qty: Decimal,

    /// Geometric quantity multiplier per level (>= 1)
    #[serde(default = "default_qty_scale")]
    pub qty_scale: Decimal,

    /// Prices never go below this fraction of the center
    #[serde(default = "default_min_price_fraction")]
    pub min_price_fraction: Decimal,

    /// Move from the last center (bps) that triggers a recenter
    #[serde(default = "default_recenter_trigger_bps")]
    pub recenter_trigger_bps: Decimal,

    /// Take-profit distance in steps, consumed by the exit layer
    #[serde(default = "default_take_profit_steps")]
    pub take_profit_steps: u32,

    /// Stop-loss distance in steps, consumed by the exit layer (0 = none)
    #[serde(default)]
    pub stop_loss_steps: u32,

    #[serde(default)]
    pub regime: RegimeConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub funding: FundingConfig,

    #[serde(default)]
    pub diff: DiffConfig,
}

fn default_qty_scale() -> Decimal {
    Decimal::ONE
}

fn default_min_price_fraction() -> Decimal {
    dec!(0.05)
}

fn default_recenter_trigger_bps() -> Decimal {
    dec!(100)
}

fn default_take_profit_steps() -> u32 {
    1
}

impl GridConfig {
    /// Create a symmetric grid configuration
    ///
    /// # Arguments
    /// * `step_bps` - Level spacing in basis points of the center
    /// * `levels` - Rungs per side
    /// * `base_qty` - Quantity of the nearest rung
    /// * `qty_scale` - Geometric multiplier applied per level
    pub fn new(step_bps: Decimal, levels: u32, base_qty: Decimal, qty_scale: Decimal) -> Self {
        Self {
            step_bps,
            levels_long: levels,
            levels_short: levels,
            base_qty,
            qty_scale,
            min_price_fraction: default_min_price_fraction(),
            recenter_trigger_bps: default_recenter_trigger_bps(),
            take_profit_steps: default_take_profit_steps(),
            stop_loss_steps: 0,
            regime: RegimeConfig::default(),
            policy: PolicyConfig::default(),
            funding: FundingConfig::default(),
            diff: DiffConfig::default(),
        }
    }

    /// Builder: set per-side depth
    pub fn with_levels(mut self, long: u32, short: u32) -> Self {
        self.levels_long = long;
        self.levels_short = short;
        self
    }

    /// Builder: select shaping policy
    pub fn with_policy(mut self, kind: PolicyKind) -> Self {
        self.policy.name = kind;
        self
    }

    /// Builder: set counter-trend throttle
    pub fn with_counter_throttle(mut self, levels: u32, qty_scale: Decimal) -> Self {
        self.policy.counter_levels = levels;
        self.policy.counter_qty_scale = qty_scale;
        self
    }

    /// Builder: set core-and-scalp depth
    pub fn with_core_levels(mut self, levels: u32) -> Self {
        self.policy.core_levels = levels;
        self
    }

    /// Builder: set regime detector parameters
    pub fn with_regime(mut self, regime: RegimeConfig) -> Self {
        self.regime = regime;
        self
    }

    /// Builder: set funding throttle parameters
    pub fn with_funding(mut self, funding: FundingConfig) -> Self {
        self.funding = funding;
        self
    }

    /// Builder: set diff tolerance bands
    pub fn with_diff(mut self, diff: DiffConfig) -> Self {
        self.diff = diff;
        self
    }

    /// Builder: set recenter trigger
    pub fn with_recenter_trigger_bps(mut self, bps: Decimal) -> Self {
        self.recenter_trigger_bps = bps;
        self
    }

    /// Builder: set price floor fraction
    pub fn with_min_price_fraction(mut self, fraction: Decimal) -> Self {
        self.min_price_fraction = fraction;
        self
    }

    /// Builder: set exit distances for the exit layer
    pub fn with_exit_steps(mut self, take_profit: u32, stop_loss: u32) -> Self {
        self.take_profit_steps = take_profit;
        self.stop_loss_steps = stop_loss;
        self
    }

    /// Rungs configured for a side
    pub fn levels(&self, side: Side) -> u32 {
        match side {
            Side::Long => self.levels_long,
            Side::Short => self.levels_short,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> GridResult<()> {
        if self.step_bps <= Decimal::ZERO {
            return Err(GridError::InvalidConfig("step_bps must be positive".into()));
        }

        if self.levels_long == 0 || self.levels_short == 0 {
            return Err(GridError::InvalidConfig(
                "levels per side must be at least 1".into(),
            ));
        }

        if self.base_qty <= Decimal::ZERO {
            return Err(GridError::InvalidConfig("base_qty must be positive".into()));
        }

        if self.qty_scale < Decimal::ONE {
            return Err(GridError::InvalidConfig(
                "qty_scale must be at least 1.0".into(),
            ));
        }

        if self.min_price_fraction <= Decimal::ZERO || self.min_price_fraction >= Decimal::ONE {
            return Err(GridError::InvalidConfig(
                "min_price_fraction must be in (0, 1)".into(),
            ));
        }

        if self.recenter_trigger_bps <= Decimal::ZERO {
            return Err(GridError::InvalidConfig(
                "recenter_trigger_bps must be positive".into(),
            ));
        }

        self.regime.validate()?;
        self.policy.validate()?;
        self.funding.validate()?;
        self.diff.validate()?;

        Ok(())
    }

    /// Load config from JSON file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to JSON file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> GridResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
