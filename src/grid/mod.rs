//! Hedge-mode grid decision core
//!
//! This module decides, for one instrument at a time, the complete set of
//! resting limit orders a two-sided grid should have on the long and short
//! books, and how to get there from the orders currently live.
//!
//! # Architecture
//!
//! The grid module is organized into several sub-modules, leaf-first:
//!
//! - [`precision`] - Tick/step/notional clamping (PrecisionGuard)
//! - [`engine`] - Ladder construction and recenter check (GridEngine)
//! - [`indicators`] - EMA, Wilder RMA, ATR and ADX in decimal arithmetic
//! - [`regime`] - Trend classification with hysteresis (RegimeDetector)
//! - [`policy`] - Regime-aware ladder shaping (PlacementPolicy)
//! - [`funding`] - Funding-cost throttle (FundingGuard)
//! - [`diff`] - Reconciliation against live orders (OrderDiff)
//! - [`pipeline`] - Per-instrument cycle and registry
//! - [`config`] - Grid configuration and validation
//! - [`types`] - Core data types (Rung, Ladder, OrderIntent, etc.)
//! - [`errors`] - Grid-specific error types
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use hedge_grid::grid::{Bar, GridConfig, GridPipeline, InstrumentPrecision};
//! use rust_decimal_macros::dec;
//!
//! // 1% steps, 3 levels per side, 1 unit per level
//! let config = GridConfig::new(dec!(100), 3, dec!(1), dec!(1));
//! let mut pipeline = GridPipeline::new("BTC", config, InstrumentPrecision::default())?;
//!
//! let mut center = dec!(0);
//! for bar in bars {
//!     let out = pipeline.on_bar(&bar, center, &exchange.open_orders(), bar.timestamp);
//!     center = out.center;
//!     if out.is_warm {
//!         exchange.execute(&out.intents);
//!     }
//! }
//! ```
//!
//! All price and quantity math uses [`rust_decimal::Decimal`]. Per-cycle
//! operations never fail: degenerate input yields empty ladders or no
//! intents and is logged.

pub mod config;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod funding;
pub mod indicators;
pub mod pipeline;
pub mod policy;
pub mod precision;
pub mod regime;
pub mod types;

// Re-export commonly used types
pub use config::{
    DiffConfig, FundingConfig, GridConfig, InstrumentPrecision, PolicyConfig, PolicyKind,
    RegimeConfig,
};
pub use diff::{within_tolerance, OrderDiff};
pub use engine::{total_ladder_qty, GridEngine, BPS};
pub use errors::{GridError, GridResult};
pub use funding::{FundingAssessment, FundingGuard, FundingState};
pub use indicators::{Atr, Ema, Rma, TrendStrength};
pub use pipeline::{CycleOutput, DepthQty, GridPipeline, InstrumentRegistry};
pub use policy::PlacementPolicy;
pub use precision::{to_decimal, PrecisionGuard};
pub use regime::{next_regime, DetectorState, RegimeDetector, RegimeReading};
pub use types::{
    Bar, FundingObservation, IntentAction, Ladder, LadderPair, LiveOrder, LiveOrderStatus,
    OrderIntent, Regime, Rung, Side, SlotId, SLOT_ID_PREFIX,
};
