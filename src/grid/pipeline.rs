//! Per-instrument decision cycle
//!
//! A [`GridPipeline`] owns every stateful piece for one instrument (regime
//! detector, funding guard and order differ) and runs the full cycle for
//! each bar: detect, recenter, build, shape, adjust, clamp and diff.
//! [`InstrumentRegistry`] keeps one pipeline per symbol so no state is ever
//! shared between instruments.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;

use super::config::{GridConfig, InstrumentPrecision};
use super::diff::OrderDiff;
use super::engine::{total_ladder_qty, GridEngine};
use super::errors::{GridError, GridResult};
use super::funding::{FundingAssessment, FundingGuard};
use super::policy::PlacementPolicy;
use super::precision::PrecisionGuard;
use super::regime::RegimeDetector;
use super::types::{Bar, FundingObservation, LadderPair, LiveOrder, OrderIntent, Regime, Side};
use crate::config::{InstrumentSettings, Settings};

/// Configured total quantity of each full ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthQty {
    pub long: Option<Decimal>,
    pub short: Option<Decimal>,
}

impl DepthQty {
    fn from_config(config: &GridConfig) -> Self {
        let side = |side: Side| total_ladder_qty(config.base_qty, config.qty_scale, config.levels(side));
        Self {
            long: side(Side::Long),
            short: side(Side::Short),
        }
    }
}

/// Result of one cycle, handed to the execution and risk layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutput {
    pub regime: Regime,
    pub is_warm: bool,
    /// Center the ladders were built around; store it as the next `last_center`
    pub center: Decimal,
    pub recentered: bool,
    /// Final ladders after shaping, funding and precision
    pub ladders: LadderPair,
    pub intents: Vec<OrderIntent>,
    pub funding: Option<FundingAssessment>,
    pub depth_qty: DepthQty,
}

#[derive(Debug, Clone)]
pub struct GridPipeline {
    symbol: String,
    config: GridConfig,
    precision: PrecisionGuard,
    detector: RegimeDetector,
    funding: FundingGuard,
    differ: OrderDiff,
}

impl GridPipeline {
    pub fn new(
        symbol: impl Into<String>,
        config: GridConfig,
        precision: InstrumentPrecision,
    ) -> GridResult<Self> {
        config.validate()?;
        precision.validate()?;

        Ok(Self {
            symbol: symbol.into(),
            precision: PrecisionGuard::new(precision),
            detector: RegimeDetector::new(config.regime),
            funding: FundingGuard::new(config.funding),
            differ: OrderDiff::new(),
            config,
        })
    }

    pub fn from_settings(settings: &InstrumentSettings) -> GridResult<Self> {
        Self::new(&settings.symbol, settings.grid.clone(), settings.precision)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn detector(&self) -> &RegimeDetector {
        &self.detector
    }

    pub fn funding_guard(&self) -> &FundingGuard {
        &self.funding
    }

    pub fn generation(&self) -> u64 {
        self.differ.generation()
    }

    pub fn on_funding(&mut self, observation: &FundingObservation) {
        self.funding.on_observation(observation);
    }

    /// Run one decision cycle
    ///
    /// `last_center` is the center returned by the previous cycle (zero if
    /// never centered) and `live` the current open-order snapshot. A bar the
    /// detector rejects (invalid, or not after the previous bar) produces no
    /// ladders and no intents and leaves the center and generation as is.
    pub fn on_bar(
        &mut self,
        bar: &Bar,
        last_center: Decimal,
        live: &[LiveOrder],
        now: DateTime<Utc>,
    ) -> CycleOutput {
        let depth_qty = DepthQty::from_config(&self.config);

        if !self.detector.accepts(bar) {
            warn!(
                "[{}] Skipping cycle on rejected bar (close={}, at {})",
                self.symbol, bar.close, bar.timestamp
            );
            let reading = self.detector.reading();
            return CycleOutput {
                regime: reading.regime,
                is_warm: reading.is_warm,
                center: last_center,
                recentered: false,
                ladders: LadderPair::empty(last_center),
                intents: Vec::new(),
                funding: None,
                depth_qty,
            };
        }

        let reading = self.detector.update(bar);
        let mid = bar.close;
        let recentered =
            GridEngine::recenter_needed(last_center, mid, self.config.recenter_trigger_bps);
        let center = if recentered {
            let generation = self.differ.advance_generation();
            info!(
                "[{}] Recentering grid {} -> {} (generation {})",
                self.symbol, last_center, mid, generation
            );
            mid
        } else {
            last_center
        };

        let raw = GridEngine::build_ladders(center, &self.config, reading.regime);
        let shaped = PlacementPolicy::shape(&raw, reading.regime, &self.config);
        let funding = self.funding.assess(&shaped, now);
        let adjusted = self.funding.adjust(&shaped, now);
        let ladders = LadderPair::new(
            self.precision.clamp_ladder(&adjusted.long),
            self.precision.clamp_ladder(&adjusted.short),
        );
        let intents = self.differ.diff(&ladders, live, &self.config.diff);

        CycleOutput {
            regime: reading.regime,
            is_warm: reading.is_warm,
            center,
            recentered,
            ladders,
            intents,
            funding,
            depth_qty,
        }
    }
}

/// Independent pipelines keyed by symbol
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    pipelines: HashMap<String, GridPipeline>,
}

impl InstrumentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one pipeline per configured instrument
    pub fn from_settings(settings: &Settings) -> GridResult<Self> {
        settings.validate()?;
        let mut registry = Self::new();
        for instrument in &settings.instruments {
            registry.register(GridPipeline::from_settings(instrument)?);
        }
        info!("Registered {} instruments", registry.len());
        Ok(registry)
    }

    /// Register a pipeline, replacing any previous one for the same symbol
    pub fn register(&mut self, pipeline: GridPipeline) {
        let symbol = pipeline.symbol().to_string();
        if self.pipelines.insert(symbol.clone(), pipeline).is_some() {
            warn!("Replaced existing pipeline for {}", symbol);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&GridPipeline> {
        self.pipelines.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> GridResult<&mut GridPipeline> {
        self.pipelines
            .get_mut(symbol)
            .ok_or_else(|| GridError::UnknownInstrument(symbol.to_string()))
    }

    /// Registered symbols in sorted order
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
