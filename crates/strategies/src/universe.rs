use chrono::NaiveDate;
use core_types::{canonical_symbol, fold_by_key, MarketBar};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Universe admission rules, applied before any scoring happens.
#[derive(Debug, Clone, Default)]
pub struct UniverseFilter {
    /// Minimum average daily volume across the symbol's window.
    pub min_volume: Decimal,
    /// Minimum number of bars a symbol must have up to the evaluation date.
    pub min_history: usize,
    /// Minimum market capitalization; `None` disables the check.
    pub min_market_cap: Option<Decimal>,
    /// Per-symbol market capitalizations, consulted only when a floor is
    /// set. A symbol with no recorded cap cannot clear the floor.
    pub market_caps: BTreeMap<String, Decimal>,
}

/// Collapses alternate spellings of one economic asset on one date into a
/// single row.
///
/// Rows whose symbols canonicalize identically (e.g. "BRK.B" and "BRK-B")
/// are folded through the shared `fold_by_key` primitive, keeping the
/// higher-volume variant; volume ties break toward the lexically smaller
/// symbol so the outcome never depends on input order. Skipping this step
/// hands one asset two fractional weight slots downstream.
pub fn deduplicate(bars: Vec<MarketBar>) -> Vec<MarketBar> {
    let before = bars.len();
    let folded = fold_by_key(
        bars,
        |bar| (bar.date, canonical_symbol(&bar.symbol)),
        |kept, candidate| {
            if candidate.volume > kept.volume
                || (candidate.volume == kept.volume && candidate.symbol < kept.symbol)
            {
                candidate
            } else {
                kept
            }
        },
    );
    let mut out: Vec<MarketBar> = folded.into_values().collect();
    out.sort_by(|a, b| (&a.symbol, a.date).cmp(&(&b.symbol, b.date)));
    if out.len() < before {
        tracing::warn!(
            dropped = before - out.len(),
            "deduplicated alternate symbol spellings in universe"
        );
    }
    out
}

/// Groups a flat, deduplicated bar list into per-symbol series sorted by
/// date. The `BTreeMap` keeps symbol iteration deterministic.
pub fn group_by_symbol(bars: Vec<MarketBar>) -> BTreeMap<String, Vec<MarketBar>> {
    let mut panel: BTreeMap<String, Vec<MarketBar>> = BTreeMap::new();
    for bar in bars {
        panel.entry(bar.symbol.clone()).or_default().push(bar);
    }
    for series in panel.values_mut() {
        series.sort_by_key(|b| b.date);
    }
    panel
}

impl UniverseFilter {
    /// Whether a symbol's trailing window admits it to the universe.
    /// Exclusion is logged, never silent.
    pub fn admits(&self, symbol: &str, date: NaiveDate, window: &[MarketBar]) -> bool {
        if window.len() < self.min_history {
            tracing::debug!(
                symbol,
                %date,
                have = window.len(),
                need = self.min_history,
                "excluded: insufficient history"
            );
            return false;
        }
        if !window.is_empty() {
            let avg_volume: Decimal =
                window.iter().map(|b| b.volume).sum::<Decimal>() / Decimal::from(window.len());
            if avg_volume < self.min_volume {
                tracing::debug!(symbol, %date, %avg_volume, "excluded: volume below minimum");
                return false;
            }
        }
        if let Some(floor) = self.min_market_cap {
            match self.market_caps.get(symbol) {
                Some(cap) if *cap >= floor => {}
                Some(cap) => {
                    tracing::debug!(symbol, %date, %cap, %floor, "excluded: market cap below minimum");
                    return false;
                }
                None => {
                    tracing::debug!(symbol, %date, %floor, "excluded: no market cap on record");
                    return false;
                }
            }
        }
        true
    }
}
