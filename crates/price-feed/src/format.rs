//! Human-readable dollar amounts.
//!
//! Two tables: prices (spot and all-time-high) and market caps. Output is for
//! display only; every grouped rendering uses `,` as the thousands separator.

use ticker_common::{Quote, QuoteKind};

/// Scaling rule a price falls into, ordered from smallest to largest magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriceBand {
    /// Below 0.00001: `$0.0₅<round(v * 1e9)>`
    CompressedFive,
    /// Below 0.000001: `$0.0₆<round(v * 1e10)>`.
    ///
    /// Known dead branch: it is tested after `CompressedFive`, which already
    /// claims every value below 0.00001, so it is never selected. Kept as is
    /// until the intended thresholds are settled.
    CompressedSix,
    /// Up to and including 1: six decimals
    Micro,
    /// Above 1: two decimals
    Cents,
    /// Above 10,000: whole dollars
    Whole,
}

impl PriceBand {
    pub fn of(raw: f64) -> Self {
        if raw > 10_000.0 {
            PriceBand::Whole
        } else if raw > 1.0 {
            PriceBand::Cents
        } else if raw < 0.000_01 {
            PriceBand::CompressedFive
        } else if raw < 0.000_001 {
            PriceBand::CompressedSix
        } else {
            PriceBand::Micro
        }
    }
}

/// (exclusive upper limit, divisor, decimals, suffix)
const MARKET_CAP_BANDS: [(f64, f64, usize, &str); 7] = [
    (1.0, 1.0, 6, ""),
    (1_000.0, 1.0, 2, ""),
    (100_000.0, 1.0, 0, ""),
    (1e6, 1e3, 2, "k"),
    (1e9, 1e6, 2, "M"),
    (1e12, 1e9, 2, "B"),
    (1e15, 1e12, 2, "T"),
];

/// Formats a spot or all-time-high price
pub fn format_price(raw: f64) -> String {
    match PriceBand::of(raw) {
        PriceBand::Whole => dollars(raw, 0),
        PriceBand::Cents => dollars(raw, 2),
        PriceBand::CompressedFive => format!("$0.0₅{:.0}", raw * 1e9),
        PriceBand::CompressedSix => format!("$0.0₆{:.0}", raw * 1e10),
        PriceBand::Micro => dollars(raw, 6),
    }
}

/// Formats a market cap; `None` from 1e15 upwards, where no unit is defined
pub fn format_market_cap(raw: f64) -> Option<String> {
    MARKET_CAP_BANDS
        .iter()
        .find(|(limit, ..)| raw < *limit)
        .map(|&(_, divisor, decimals, suffix)| {
            format!("{}{}", dollars(raw / divisor, decimals), suffix)
        })
}

/// Picks the table matching the quote kind
pub fn format_quote(quote: &Quote) -> Option<String> {
    match quote.kind {
        QuoteKind::Spot | QuoteKind::AllTimeHigh => Some(format_price(quote.value)),
        QuoteKind::MarketCap => format_market_cap(quote.value),
    }
}

fn dollars(value: f64, decimals: usize) -> String {
    format!("${}", group_thousands(&format!("{:.*}", decimals, value)))
}

/// Inserts `,` every three digits of the integer part of a fixed-point string
pub fn group_thousands(fixed: &str) -> String {
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(fixed.len() + int_part.len() / 3);
    grouped.push_str(sign);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(frac_part) = frac_part {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}
