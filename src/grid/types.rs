//! Core data types for the hedge grid

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{GridError, GridResult};
use super::precision::to_decimal;

/// Prefix of every identifier produced by [`SlotId`]
pub const SLOT_ID_PREFIX: &str = "hg";

/// Book side in hedge mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Single-letter code used inside derived order ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "L",
            Side::Short => "S",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "L" => Some(Side::Long),
            "S" => Some(Side::Short),
            _ => None,
        }
    }
}

/// Trend classification of the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Regime {
    Up,
    Down,
    #[default]
    Sideways,
}

impl Regime {
    /// The side whose direction opposes the trend, if trending
    pub fn counter_side(&self) -> Option<Side> {
        match self {
            Regime::Up => Some(Side::Short),
            Regime::Down => Some(Side::Long),
            Regime::Sideways => None,
        }
    }

    /// Check if the regime is directional
    pub fn is_trending(&self) -> bool {
        !matches!(self, Regime::Sideways)
    }
}

/// One priced and sized level of a ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rung {
    pub side: Side,
    /// 1-based distance from the center in grid steps
    pub level: u32,
    pub price: Decimal,
    pub qty: Decimal,
}

impl Rung {
    pub fn new(side: Side, level: u32, price: Decimal, qty: Decimal) -> Self {
        Self {
            side,
            level,
            price,
            qty,
        }
    }

    /// Copy of this rung carrying a different quantity
    pub fn with_qty(&self, qty: Decimal) -> Self {
        Self { qty, ..*self }
    }

    /// Quote value of the rung; `None` on overflow
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.qty)
    }
}

/// Ordered rungs for one side, nearest-to-center first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ladder {
    pub side: Side,
    pub center: Decimal,
    pub rungs: Vec<Rung>,
}

impl Ladder {
    pub fn new(side: Side, center: Decimal, rungs: Vec<Rung>) -> Self {
        Self {
            side,
            center,
            rungs,
        }
    }

    /// Ladder with no rungs
    pub fn empty(side: Side, center: Decimal) -> Self {
        Self::new(side, center, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    /// Find the rung at a level
    pub fn get(&self, level: u32) -> Option<&Rung> {
        self.rungs.iter().find(|r| r.level == level)
    }

    pub fn prices(&self) -> Vec<Decimal> {
        self.rungs.iter().map(|r| r.price).collect()
    }

    pub fn quantities(&self) -> Vec<Decimal> {
        self.rungs.iter().map(|r| r.qty).collect()
    }

    pub fn total_qty(&self) -> Decimal {
        self.rungs.iter().map(|r| r.qty).sum()
    }

    /// Sum of rung notionals; `None` on overflow
    pub fn total_notional(&self) -> Option<Decimal> {
        self.rungs
            .iter()
            .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.notional()?))
    }

    /// Keep only the `depth` rungs nearest the center
    pub fn truncated(&self, depth: usize) -> Self {
        Self::new(
            self.side,
            self.center,
            self.rungs.iter().take(depth).copied().collect(),
        )
    }

    /// New ladder with every quantity multiplied by `factor`
    pub fn scaled(&self, factor: Decimal) -> Self {
        Self::new(
            self.side,
            self.center,
            self.rungs.iter().map(|r| r.with_qty(r.qty * factor)).collect(),
        )
    }
}

/// Long and short ladders built around the same center
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LadderPair {
    pub long: Ladder,
    pub short: Ladder,
}

impl LadderPair {
    pub fn new(long: Ladder, short: Ladder) -> Self {
        Self { long, short }
    }

    /// Two empty ladders
    pub fn empty(center: Decimal) -> Self {
        Self::new(
            Ladder::empty(Side::Long, center),
            Ladder::empty(Side::Short, center),
        )
    }

    pub fn side(&self, side: Side) -> &Ladder {
        match side {
            Side::Long => &self.long,
            Side::Short => &self.short,
        }
    }

    /// Replace the ladder for one side
    pub fn with_side(mut self, ladder: Ladder) -> Self {
        match ladder.side {
            Side::Long => self.long = ladder,
            Side::Short => self.short = ladder,
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.long.is_empty() && self.short.is_empty()
    }

    /// All rungs, long side first
    pub fn rungs(&self) -> impl Iterator<Item = &Rung> {
        self.long.rungs.iter().chain(self.short.rungs.iter())
    }
}

/// One price bar fed to the regime detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Bar {
    pub fn new(close: Decimal, high: Decimal, low: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            close,
            high,
            low,
            timestamp,
        }
    }

    /// Bar derived from a single close, high and low equal to it
    pub fn from_close(close: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self::new(close, close, close, timestamp)
    }

    /// Build from host floats; `None` if any value is not finite
    pub fn from_f64(close: f64, high: f64, low: f64, timestamp: DateTime<Utc>) -> Option<Self> {
        Some(Self::new(
            to_decimal(close)?,
            to_decimal(high)?,
            to_decimal(low)?,
            timestamp,
        ))
    }

    /// Check basic bar sanity: positive prices with `low <= close <= high`
    pub fn is_valid(&self) -> bool {
        self.close > Decimal::ZERO
            && self.low > Decimal::ZERO
            && self.low <= self.close
            && self.close <= self.high
    }
}

/// Funding observation reported by the data layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingObservation {
    /// Rate per settlement as a fraction (0.0001 = 1 bp); positive means longs pay
    pub rate: Decimal,
    pub next_funding: DateTime<Utc>,
}

impl FundingObservation {
    pub fn new(rate: Decimal, next_funding: DateTime<Utc>) -> Self {
        Self { rate, next_funding }
    }
}

/// Exchange status of a live order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveOrderStatus {
    /// Sent, not yet acknowledged
    New,
    /// Resting on the book
    Open,
    PartiallyFilled,
    /// Cancel already requested
    PendingCancel,
}

impl LiveOrderStatus {
    /// Check if the order still occupies its slot
    pub fn is_resting(&self) -> bool {
        matches!(
            self,
            LiveOrderStatus::New | LiveOrderStatus::Open | LiveOrderStatus::PartiallyFilled
        )
    }
}

/// Snapshot of a currently-open order, owned by the execution layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LiveOrder {
    pub id: String,
    pub side: Side,
    pub level: u32,
    pub price: Decimal,
    pub qty: Decimal,
    pub status: LiveOrderStatus,
}

impl LiveOrder {
    pub fn new(
        id: impl Into<String>,
        side: Side,
        level: u32,
        price: Decimal,
        qty: Decimal,
        status: LiveOrderStatus,
    ) -> Self {
        Self {
            id: id.into(),
            side,
            level,
            price,
            qty,
            status,
        }
    }

    /// Resting order mirroring a desired rung
    pub fn from_rung(rung: &Rung, generation: u64) -> Self {
        Self::new(
            SlotId::new(rung.side, rung.level, generation).to_string(),
            rung.side,
            rung.level,
            rung.price,
            rung.qty,
            LiveOrderStatus::Open,
        )
    }
}

/// Reconciliation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntentAction {
    Cancel,
    Replace,
    Add,
}

/// Instruction for the execution layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderIntent {
    pub action: IntentAction,
    pub side: Side,
    pub level: u32,
    pub price: Decimal,
    pub qty: Decimal,
    /// Stable identity of the slot for this generation
    pub derived_id: String,
    /// Live order targeted by a CANCEL or REPLACE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_id: Option<String>,
}

impl OrderIntent {
    /// Place a new order for a rung
    pub fn add(rung: &Rung, generation: u64) -> Self {
        Self {
            action: IntentAction::Add,
            side: rung.side,
            level: rung.level,
            price: rung.price,
            qty: rung.qty,
            derived_id: SlotId::new(rung.side, rung.level, generation).to_string(),
            live_id: None,
        }
    }

    /// Atomically swap a live order for a rung
    pub fn replace(rung: &Rung, live: &LiveOrder, generation: u64) -> Self {
        Self {
            action: IntentAction::Replace,
            live_id: Some(live.id.clone()),
            ..Self::add(rung, generation)
        }
    }

    /// Cancel a live order
    pub fn cancel(live: &LiveOrder, side: Side, level: u32) -> Self {
        Self {
            action: IntentAction::Cancel,
            side,
            level,
            price: live.price,
            qty: live.qty,
            derived_id: live.id.clone(),
            live_id: Some(live.id.clone()),
        }
    }
}

/// Deterministic identity of a ladder slot: `hg-{L|S}-{level}-{generation}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    pub side: Side,
    pub level: u32,
    pub generation: u64,
}

impl SlotId {
    pub fn new(side: Side, level: u32, generation: u64) -> Self {
        Self {
            side,
            level,
            generation,
        }
    }

    /// Parse an identifier produced by `Display`
    pub fn parse(id: &str) -> GridResult<Self> {
        let malformed = || GridError::MalformedOrderId(id.to_string());

        let mut parts = id.split('-');
        if parts.next() != Some(SLOT_ID_PREFIX) {
            return Err(malformed());
        }
        let side = parts.next().and_then(Side::from_code).ok_or_else(malformed)?;
        let level: u32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .filter(|l| *l >= 1)
            .ok_or_else(malformed)?;
        let generation: u64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Self::new(side, level, generation))
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            SLOT_ID_PREFIX,
            self.side.as_str(),
            self.level,
            self.generation
        )
    }
}
