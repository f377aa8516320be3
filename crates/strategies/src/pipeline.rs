use crate::error::StrategyError;
use crate::models::FactorModel;
use crate::scorer::score_universe;
use crate::selection::select;
use crate::universe::UniverseFilter;
use crate::weights::calculate_weights;
use chrono::NaiveDate;
use configuration::StrategyConfig;
use core_types::{MarketBar, Position, Side};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// The full evaluation pipeline for one strategy on one rebalance date:
/// score the filtered universe, cut the two tails, weight each side.
///
/// The panel must already be deduplicated (see `universe::deduplicate`);
/// everything here operates on information up to and including `date`.
/// Any `DataError` or `ValidationError` aborts the date before a single
/// weight is produced.
pub fn target_book(
    date: NaiveDate,
    panel: &BTreeMap<String, Vec<MarketBar>>,
    cfg: &StrategyConfig,
    filter: &UniverseFilter,
    model: &dyn FactorModel,
    volatilities: &BTreeMap<String, Decimal>,
) -> Result<Vec<Position>, StrategyError> {
    let scores = score_universe(date, panel, cfg.window, filter, model)?;
    let selection = select(&scores, cfg)?;

    let mut book = calculate_weights(
        &selection.long,
        Side::Long,
        cfg.long_alloc,
        cfg.weighting,
        volatilities,
    )?;
    book.extend(calculate_weights(
        &selection.short,
        Side::Short,
        cfg.short_alloc,
        cfg.weighting,
        volatilities,
    )?);

    tracing::info!(
        strategy = %cfg.name,
        %date,
        positions = book.len(),
        "rebalance book computed"
    );
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrailingReturn;
    use crate::universe::{deduplicate, group_by_symbol};
    use core_types::{Direction, WeightingMethod};
    use rust_decimal_macros::dec;

    fn series(symbol: &str, closes: &[i64], volume: Decimal) -> Vec<MarketBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| MarketBar {
                symbol: symbol.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64),
                open: Decimal::from(c),
                high: Decimal::from(c),
                low: Decimal::from(c),
                close: Decimal::from(c),
                volume,
            })
            .collect()
    }

    fn cfg() -> StrategyConfig {
        StrategyConfig {
            name: "xs_momentum".to_string(),
            window: 2,
            rebalance_days: 1,
            long_pct: dec!(25),
            short_pct: dec!(75),
            weighting: WeightingMethod::Equal,
            long_alloc: Decimal::ONE,
            short_alloc: Decimal::ONE,
            max_positions: 5,
            direction: Direction::Momentum,
        }
    }

    fn filter() -> UniverseFilter {
        UniverseFilter::default()
    }

    fn universe(extra_spelling: bool) -> Vec<MarketBar> {
        let mut bars = series("BRK-B", &[100, 120], dec!(900));
        if extra_spelling {
            // Same asset, alternate spelling, thinner volume.
            bars.extend(series("BRK.B", &[100, 119], dec!(400)));
        }
        bars.extend(series("AAA", &[100, 105], dec!(500)));
        bars.extend(series("BBB", &[100, 95], dec!(500)));
        bars.extend(series("CCC", &[100, 90], dec!(500)));
        bars
    }

    #[test]
    fn duplicate_spelling_produces_identical_weights() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let run = |with_duplicate: bool| {
            let panel = group_by_symbol(deduplicate(universe(with_duplicate)));
            target_book(date, &panel, &cfg(), &filter(), &TrailingReturn, &BTreeMap::new())
                .unwrap()
        };

        let clean = run(false);
        let deduped = run(true);
        // Bit-for-bit identical book: the alternate spelling must not
        // claim a second weight slot or shift any percentile.
        assert_eq!(clean, deduped);

        let brk_slots = deduped
            .iter()
            .filter(|p| p.symbol.starts_with("BRK"))
            .count();
        assert_eq!(brk_slots, 1);
    }

    #[test]
    fn long_and_short_sides_sum_to_their_allocations() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let panel = group_by_symbol(deduplicate(universe(false)));
        let book =
            target_book(date, &panel, &cfg(), &filter(), &TrailingReturn, &BTreeMap::new())
                .unwrap();

        let long_sum: Decimal = book
            .iter()
            .filter(|p| p.side == Side::Long)
            .map(|p| p.weight)
            .sum();
        let short_sum: Decimal = book
            .iter()
            .filter(|p| p.side == Side::Short)
            .map(|p| p.weight)
            .sum();
        assert!((long_sum - Decimal::ONE).abs() < dec!(0.000001));
        assert!((short_sum - Decimal::ONE).abs() < dec!(0.000001));

        // No symbol may sit on both sides.
        for p in book.iter().filter(|p| p.side == Side::Long) {
            assert!(!book
                .iter()
                .any(|q| q.side == Side::Short && q.symbol == p.symbol));
        }
    }
}
