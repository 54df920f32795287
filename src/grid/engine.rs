//! Grid engine - builds the long and short ladders around a center price

use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::config::GridConfig;
use super::precision::to_decimal;
use super::types::{Ladder, LadderPair, Regime, Rung, Side};

/// Basis points per unit
pub const BPS: Decimal = dec!(10000);

/// Stateless ladder builder
#[derive(Debug, Clone, Copy, Default)]
pub struct GridEngine;

impl GridEngine {
    /// Price distance between adjacent levels: `mid * step_bps / 10000`
    pub fn step(mid: Decimal, step_bps: Decimal) -> Decimal {
        mid.checked_mul(step_bps)
            .map(|v| v / BPS)
            .unwrap_or(Decimal::ZERO)
    }

    /// Build raw long and short ladders around `mid`
    ///
    /// Long rungs sit below `mid` with strictly decreasing prices, short rungs
    /// above it with strictly increasing prices. Rung `level` carries
    /// `base_qty * qty_scale^(level-1)`. A non-positive `mid` yields two
    /// empty ladders.
    pub fn build_ladders(mid: Decimal, config: &GridConfig, regime: Regime) -> LadderPair {
        if mid <= Decimal::ZERO {
            warn!("Cannot build ladders around mid {}", mid);
            return LadderPair::empty(Decimal::ZERO);
        }

        let step = Self::step(mid, config.step_bps);
        if step <= Decimal::ZERO {
            warn!(
                "Grid step is not positive (mid={}, step_bps={}), skipping ladders",
                mid, config.step_bps
            );
            return LadderPair::empty(mid);
        }

        debug!(
            "Building ladders around {} with step {} in {:?} regime",
            mid, step, regime
        );

        LadderPair::new(
            Self::build_side(Side::Long, mid, step, config),
            Self::build_side(Side::Short, mid, step, config),
        )
    }

    /// Same as [`GridEngine::build_ladders`] for a host float mid
    ///
    /// NaN and infinite prices yield two empty ladders.
    pub fn build_ladders_f64(mid: f64, config: &GridConfig, regime: Regime) -> LadderPair {
        match to_decimal(mid) {
            Some(mid) => Self::build_ladders(mid, config, regime),
            None => {
                warn!("Cannot build ladders around non-finite mid {}", mid);
                LadderPair::empty(Decimal::ZERO)
            }
        }
    }

    fn build_side(side: Side, mid: Decimal, step: Decimal, config: &GridConfig) -> Ladder {
        let levels = config.levels(side);
        let floor = mid * config.min_price_fraction.max(Decimal::ZERO);
        let mut rungs = Vec::with_capacity(levels as usize);
        let mut qty = Some(config.base_qty);

        for level in 1..=levels {
            let Some(level_qty) = qty else {
                warn!("{:?} quantity overflow at level {}, truncating ladder", side, level);
                break;
            };

            let price = step
                .checked_mul(Decimal::from(level))
                .and_then(|offset| match side {
                    Side::Long => mid.checked_sub(offset),
                    Side::Short => mid.checked_add(offset),
                });
            let Some(price) = price else {
                warn!("{:?} price overflow at level {}, truncating ladder", side, level);
                break;
            };

            if side == Side::Long && (price <= floor || price <= Decimal::ZERO) {
                warn!(
                    "Long level {} price {} is below floor {}, truncating ladder at {} rungs",
                    level,
                    price,
                    floor,
                    rungs.len()
                );
                break;
            }

            rungs.push(Rung::new(side, level, price, level_qty));
            qty = level_qty.checked_mul(config.qty_scale);
        }

        Ladder::new(side, mid, rungs)
    }

    /// Whether the grid must be re-anchored at `new_mid`
    ///
    /// True when never centered (`last_center <= 0`) or when the move from the
    /// last center reaches `trigger_bps`.
    pub fn recenter_needed(last_center: Decimal, new_mid: Decimal, trigger_bps: Decimal) -> bool {
        if last_center <= Decimal::ZERO {
            return true;
        }
        if new_mid == last_center {
            return false;
        }

        let moved = (new_mid - last_center).abs();
        match moved.checked_mul(BPS).and_then(|v| v.checked_div(last_center)) {
            Some(moved_bps) => moved_bps >= trigger_bps,
            None => true,
        }
    }
}

/// Total quantity of an `n`-rung ladder: `base * (scale^n - 1) / (scale - 1)`
///
/// Uses `base * n` when `scale == 1`. `None` on overflow.
pub fn total_ladder_qty(base_qty: Decimal, qty_scale: Decimal, levels: u32) -> Option<Decimal> {
    if levels == 0 {
        return Some(Decimal::ZERO);
    }
    if qty_scale == Decimal::ONE {
        return base_qty.checked_mul(Decimal::from(levels));
    }

    let mut power = Decimal::ONE;
    for _ in 0..levels {
        power = power.checked_mul(qty_scale)?;
    }
    base_qty
        .checked_mul(power - Decimal::ONE)?
        .checked_div(qty_scale - Decimal::ONE)
}
