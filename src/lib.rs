#![deny(unreachable_pub)]
pub mod config;
pub mod grid;

pub use config::{InstrumentSettings, LogConfig, Settings};
pub use grid::{
    Bar, CycleOutput, FundingObservation, GridConfig, GridError, GridPipeline, GridResult,
    InstrumentPrecision, InstrumentRegistry, LadderPair, LiveOrder, OrderIntent, Regime, Side,
};
