use serde::{Deserialize, Serialize};

use super::feed::{Currency, ExchangeRates};

/// One amount expressed in every supported currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ConvertedAmounts {
    pub uah: f64,
    pub pln: f64,
    pub eur: f64,
    pub usd: f64,
}

impl ConvertedAmounts {
    pub fn get(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Uah => self.uah,
            Currency::Usd => self.usd,
            Currency::Eur => self.eur,
            Currency::Pln => self.pln,
        }
    }
}

/// Convert through hryvnia, rounding each result to cents.
pub fn convert_all(amount: f64, from: Currency, rates: &ExchangeRates) -> ConvertedAmounts {
    let uah = amount * rates.rate(from);
    ConvertedAmounts {
        uah: round_cents(uah),
        pln: round_cents(uah / rates.pln),
        eur: round_cents(uah / rates.eur),
        usd: round_cents(uah / rates.usd),
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
