//! Streaming trend and volatility indicators in decimal arithmetic

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::Bar;

const HUNDRED: Decimal = dec!(100);

/// Exponential moving average seeded with the first observation
#[derive(Debug, Clone)]
pub struct Ema {
    window: u32,
    alpha: Decimal,
    value: Option<Decimal>,
    count: u32,
}

impl Ema {
    /// `alpha = 2 / (window + 1)`
    pub fn new(window: u32) -> Self {
        let window = window.max(1);
        Self {
            window,
            alpha: dec!(2) / Decimal::from(window + 1),
            value: None,
            count: 0,
        }
    }

    pub fn update(&mut self, x: Decimal) -> Decimal {
        let next = match self.value {
            None => x,
            Some(prev) => prev + self.alpha * (x - prev),
        };
        self.value = Some(next);
        self.count = self.count.saturating_add(1);
        next
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    /// Filled once `window` observations have been seen
    pub fn is_warm(&self) -> bool {
        self.count >= self.window
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Wilder's running moving average, seeded by the simple mean of the first window
#[derive(Debug, Clone)]
pub struct Rma {
    window: u32,
    sum: Decimal,
    value: Option<Decimal>,
    count: u32,
}

impl Rma {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            sum: Decimal::ZERO,
            value: None,
            count: 0,
        }
    }

    pub fn update(&mut self, x: Decimal) -> Option<Decimal> {
        let n = Decimal::from(self.window);
        self.count = self.count.saturating_add(1);

        match self.value {
            Some(prev) => {
                self.value = Some((prev * (n - Decimal::ONE) + x) / n);
            }
            None => {
                self.sum += x;
                if self.count >= self.window {
                    self.value = Some(self.sum / n);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn is_warm(&self) -> bool {
        self.value.is_some()
    }
}

fn true_range(bar: &Bar, prev_close: Option<Decimal>) -> Decimal {
    let range = bar.high - bar.low;
    match prev_close {
        Some(pc) => range
            .max((bar.high - pc).abs())
            .max((bar.low - pc).abs()),
        None => range,
    }
}

/// Average true range
#[derive(Debug, Clone)]
pub struct Atr {
    rma: Rma,
    prev_close: Option<Decimal>,
}

impl Atr {
    pub fn new(window: u32) -> Self {
        Self {
            rma: Rma::new(window),
            prev_close: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<Decimal> {
        let tr = true_range(bar, self.prev_close);
        self.prev_close = Some(bar.close);
        self.rma.update(tr)
    }

    pub fn value(&self) -> Option<Decimal> {
        self.rma.value()
    }

    pub fn is_warm(&self) -> bool {
        self.rma.is_warm()
    }
}

/// Directional trend strength on a 0..100 scale (Wilder's ADX)
#[derive(Debug, Clone)]
pub struct TrendStrength {
    tr: Rma,
    plus_dm: Rma,
    minus_dm: Rma,
    dx: Rma,
    prev: Option<Bar>,
}

impl TrendStrength {
    pub fn new(window: u32) -> Self {
        Self {
            tr: Rma::new(window),
            plus_dm: Rma::new(window),
            minus_dm: Rma::new(window),
            dx: Rma::new(window),
            prev: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<Decimal> {
        let Some(prev) = self.prev.replace(*bar) else {
            return None;
        };

        let up = bar.high - prev.high;
        let down = prev.low - bar.low;
        let plus = if up > down && up > Decimal::ZERO { up } else { Decimal::ZERO };
        let minus = if down > up && down > Decimal::ZERO { down } else { Decimal::ZERO };

        let tr = self.tr.update(true_range(bar, Some(prev.close)));
        let plus = self.plus_dm.update(plus);
        let minus = self.minus_dm.update(minus);

        let (Some(tr), Some(plus), Some(minus)) = (tr, plus, minus) else {
            return None;
        };

        let dx = if tr.is_zero() {
            Decimal::ZERO
        } else {
            let plus_di = HUNDRED * plus / tr;
            let minus_di = HUNDRED * minus / tr;
            let sum = plus_di + minus_di;
            if sum.is_zero() {
                Decimal::ZERO
            } else {
                HUNDRED * (plus_di - minus_di).abs() / sum
            }
        };

        self.dx.update(dx)
    }

    pub fn value(&self) -> Option<Decimal> {
        self.dx.value()
    }

    pub fn is_warm(&self) -> bool {
        self.dx.is_warm()
    }
}
