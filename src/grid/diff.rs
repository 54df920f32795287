//! Reconciliation of desired ladders against live orders
//!
//! [`OrderDiff::diff`] indexes the live snapshot by the `(side, level)` slot
//! encoded in each order id and walks the desired rungs:
//!
//! - no live order in the slot: `Add`
//! - live order within the tolerance bands: nothing
//! - live order outside the bands: `Replace`
//! - live order whose slot is no longer desired: `Cancel`
//!
//! The result is ordered cancels first, then replaces, then adds, each group
//! by side and level. The last inputs and output are cached so an unchanged
//! cycle returns without recomputation.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::config::DiffConfig;
use super::engine::BPS;
use super::types::{IntentAction, LadderPair, LiveOrder, OrderIntent, Rung, Side, SlotId};

const PERCENT: Decimal = dec!(100);

/// Inputs and result of the last reconciliation
///
/// Decimal equality and hashing ignore scale, so `99` and `99.00` are the
/// same input here. A hit returns the stored intents, whose prices and
/// quantities carry the scale of the inputs that populated the cache.
#[derive(Debug, Clone)]
struct CachedDiff {
    fingerprint: u64,
    desired: LadderPair,
    live: Vec<LiveOrder>,
    tolerance: DiffConfig,
    generation: u64,
    intents: Vec<OrderIntent>,
}

impl CachedDiff {
    fn matches(
        &self,
        fingerprint: u64,
        desired: &LadderPair,
        live: &[LiveOrder],
        tolerance: &DiffConfig,
        generation: u64,
    ) -> bool {
        self.fingerprint == fingerprint
            && self.generation == generation
            && self.tolerance == *tolerance
            && self.desired == *desired
            && self.live == live
    }
}

/// Stateful differ, one per instrument
#[derive(Debug, Clone, Default)]
pub struct OrderDiff {
    generation: u64,
    cache: Option<CachedDiff>,
    cache_hits: u64,
}

impl OrderDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation stamped into derived ids of new orders
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new id generation, called on every recenter
    pub fn advance_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    fn fingerprint(
        desired: &LadderPair,
        live: &[LiveOrder],
        tolerance: &DiffConfig,
        generation: u64,
    ) -> u64 {
        let mut hasher = DefaultHasher::new();
        desired.hash(&mut hasher);
        live.hash(&mut hasher);
        tolerance.price_tolerance_bps.hash(&mut hasher);
        tolerance.qty_tolerance_pct.hash(&mut hasher);
        generation.hash(&mut hasher);
        hasher.finish()
    }

    /// Compute the intents that move `live` onto `desired`
    ///
    /// Inputs equal to the previous call's (by decimal value, not scale) reuse
    /// its intents.
    pub fn diff(
        &mut self,
        desired: &LadderPair,
        live: &[LiveOrder],
        tolerance: &DiffConfig,
    ) -> Vec<OrderIntent> {
        let fingerprint = Self::fingerprint(desired, live, tolerance, self.generation);
        if let Some(cached) = &self.cache {
            if cached.matches(fingerprint, desired, live, tolerance, self.generation) {
                self.cache_hits += 1;
                debug!("Diff inputs unchanged, reusing {} intents", cached.intents.len());
                return cached.intents.clone();
            }
        }

        let intents = Self::reconcile(desired, live, tolerance, self.generation);

        self.cache = Some(CachedDiff {
            fingerprint,
            desired: desired.clone(),
            live: live.to_vec(),
            tolerance: *tolerance,
            generation: self.generation,
            intents: intents.clone(),
        });

        intents
    }

    fn reconcile(
        desired: &LadderPair,
        live: &[LiveOrder],
        tolerance: &DiffConfig,
        generation: u64,
    ) -> Vec<OrderIntent> {
        let mut intents = Vec::new();
        let mut slots: BTreeMap<(Side, u32), &LiveOrder> = BTreeMap::new();

        for order in live {
            let slot = match SlotId::parse(&order.id) {
                Ok(slot) => slot,
                Err(e) => {
                    warn!("Ignoring live order: {}", e);
                    continue;
                }
            };
            if slot.side != order.side || slot.level != order.level {
                warn!(
                    "Ignoring live order {}: id does not match {:?} level {}",
                    order.id, order.side, order.level
                );
                continue;
            }
            if !order.status.is_resting() {
                debug!("Skipping live order {} in status {:?}", order.id, order.status);
                continue;
            }

            let key = (slot.side, slot.level);
            if slots.contains_key(&key) {
                warn!(
                    "Duplicate live order {} at {:?} level {}, cancelling",
                    order.id, slot.side, slot.level
                );
                intents.push(OrderIntent::cancel(order, slot.side, slot.level));
                continue;
            }
            slots.insert(key, order);
        }

        for rung in desired.rungs() {
            match slots.remove(&(rung.side, rung.level)) {
                None => intents.push(OrderIntent::add(rung, generation)),
                Some(order) if within_tolerance(rung, order, tolerance) => {}
                Some(order) => intents.push(OrderIntent::replace(rung, order, generation)),
            }
        }

        for ((side, level), order) in slots {
            intents.push(OrderIntent::cancel(order, side, level));
        }

        intents.sort_by_key(|i| (i.action, i.side, i.level));

        debug!(
            "Diff: {} cancel, {} replace, {} add",
            count(&intents, IntentAction::Cancel),
            count(&intents, IntentAction::Replace),
            count(&intents, IntentAction::Add)
        );

        intents
    }
}

fn count(intents: &[OrderIntent], action: IntentAction) -> usize {
    intents.iter().filter(|i| i.action == action).count()
}

/// Relative deviation of `actual` from `target`, in `unit`s
fn deviation(actual: Decimal, target: Decimal, unit: Decimal) -> Option<Decimal> {
    if target.is_zero() {
        return None;
    }
    (actual - target)
        .abs()
        .checked_mul(unit)
        .and_then(|v| v.checked_div(target.abs()))
}

/// Whether a live order is close enough to a desired rung to be kept
pub fn within_tolerance(rung: &Rung, order: &LiveOrder, tolerance: &DiffConfig) -> bool {
    let price_ok = match deviation(order.price, rung.price, BPS) {
        Some(bps) => bps <= tolerance.price_tolerance_bps,
        None => order.price == rung.price,
    };
    let qty_ok = match deviation(order.qty, rung.qty, PERCENT) {
        Some(pct) => pct <= tolerance.qty_tolerance_pct,
        None => order.qty == rung.qty,
    };
    price_ok && qty_ok
}
