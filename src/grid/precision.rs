//! Tick/step/notional clamping in exact decimal arithmetic

use log::debug;
use rust_decimal::Decimal;

use super::config::InstrumentPrecision;
use super::types::{Ladder, Rung, Side};

/// Convert a host float into a decimal, rejecting NaN and infinities
pub fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::try_from(value).ok()
}

/// Rounds prices and quantities to the increments an instrument accepts.
///
/// Every operation is idempotent: clamping an already clamped value returns
/// it unchanged. Rejected quantities come back as `Decimal::ZERO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecisionGuard {
    precision: InstrumentPrecision,
}

impl PrecisionGuard {
    pub fn new(precision: InstrumentPrecision) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> &InstrumentPrecision {
        &self.precision
    }

    /// Round a price to the nearest tick (ties to even)
    ///
    /// A non-positive tick leaves the price untouched.
    pub fn clamp_price(price: Decimal, tick_size: Decimal) -> Decimal {
        if tick_size <= Decimal::ZERO {
            return price.normalize();
        }
        match price.checked_div(tick_size) {
            Some(ticks) => (ticks.round() * tick_size).normalize(),
            None => Decimal::ZERO,
        }
    }

    /// Round a quantity down to the step size
    ///
    /// Returns zero when the rounded quantity is not positive or its value at
    /// `ref_price` is below `min_notional`.
    pub fn clamp_qty(
        qty: Decimal,
        step_size: Decimal,
        min_notional: Decimal,
        ref_price: Decimal,
    ) -> Decimal {
        let rounded = if step_size <= Decimal::ZERO {
            qty
        } else {
            match qty.checked_div(step_size) {
                Some(steps) => steps.floor() * step_size,
                None => return Decimal::ZERO,
            }
        };

        if rounded <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let notional = rounded.checked_mul(ref_price).unwrap_or(Decimal::MAX);
        if notional < min_notional {
            return Decimal::ZERO;
        }

        rounded.normalize()
    }

    /// Clamp a rung with this instrument's rules; `None` if rejected
    pub fn clamp_rung(&self, rung: &Rung) -> Option<Rung> {
        let price = Self::clamp_price(rung.price, self.precision.tick_size);
        if price <= Decimal::ZERO {
            return None;
        }
        let qty = Self::clamp_qty(
            rung.qty,
            self.precision.step_size,
            self.precision.min_notional,
            price,
        );
        if qty.is_zero() {
            return None;
        }
        Some(Rung::new(rung.side, rung.level, price, qty))
    }

    /// Clamp every rung of a ladder
    ///
    /// Rungs that are rejected, that would land on or across the center, or
    /// that would not strictly move away from the previous rung are dropped.
    /// Surviving rungs keep their level numbers.
    pub fn clamp_ladder(&self, ladder: &Ladder) -> Ladder {
        let mut rungs: Vec<Rung> = Vec::with_capacity(ladder.len());

        for rung in &ladder.rungs {
            let Some(clamped) = self.clamp_rung(rung) else {
                debug!(
                    "Dropping {:?} level {}: rejected by precision (price={}, qty={})",
                    rung.side, rung.level, rung.price, rung.qty
                );
                continue;
            };

            let beyond_center = match ladder.side {
                Side::Long => clamped.price < ladder.center,
                Side::Short => clamped.price > ladder.center,
            };
            let advances = rungs.last().map_or(true, |prev| match ladder.side {
                Side::Long => clamped.price < prev.price,
                Side::Short => clamped.price > prev.price,
            });

            if beyond_center && advances {
                rungs.push(clamped);
            } else {
                debug!(
                    "Dropping {:?} level {}: price {} collides after tick rounding",
                    rung.side, rung.level, clamped.price
                );
            }
        }

        Ladder::new(ladder.side, ladder.center, rungs)
    }
}
