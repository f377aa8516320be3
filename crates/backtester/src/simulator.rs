use crate::error::BacktestError;
use crate::scheduler::{RebalanceScheduler, RebalanceState};
use chrono::NaiveDate;
use configuration::StrategyConfig;
use core_types::{MarketBar, PortfolioState, WeightingMethod};
use risk::ExposureGuard;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strategies::{target_book, trailing_volatilities, FactorModel, UniverseFilter};

/// Simulates one strategy's scheduled weights over historical bars.
///
/// Single-threaded and deterministic: identical inputs always reproduce
/// the identical `PortfolioState` sequence.
pub struct PortfolioSimulator {
    cfg: StrategyConfig,
    filter: UniverseFilter,
    model: Box<dyn FactorModel>,
    guard: ExposureGuard,
    initial_capital: Decimal,
    /// Linear transaction cost in basis points of turnover, charged on
    /// rebalance days only.
    cost_bps: Decimal,
    /// Checked only between rebalance dates; a rebalance in progress is
    /// never cut short.
    abort: Option<Arc<AtomicBool>>,
}

impl PortfolioSimulator {
    pub fn new(
        cfg: StrategyConfig,
        filter: UniverseFilter,
        model: Box<dyn FactorModel>,
        guard: ExposureGuard,
        initial_capital: Decimal,
        cost_bps: Decimal,
    ) -> Self {
        Self {
            cfg,
            filter,
            model,
            guard,
            initial_capital,
            cost_bps,
            abort: None,
        }
    }

    /// Installs a cooperative abort flag.
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Runs the simulation over a deduplicated per-symbol panel,
    /// producing one `PortfolioState` per trading day.
    pub fn run(
        &self,
        panel: &BTreeMap<String, Vec<MarketBar>>,
    ) -> Result<Vec<PortfolioState>, BacktestError> {
        let dates = trading_calendar(panel);
        if dates.is_empty() {
            return Err(BacktestError::DataUnavailable);
        }
        let closes = close_panel(panel);
        let scheduler = RebalanceScheduler::new(self.cfg.rebalance_days);

        let mut value = self.initial_capital;
        let mut weights: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut history: Vec<PortfolioState> = Vec::with_capacity(dates.len());

        for (day_index, &date) in dates.iter().enumerate() {
            if scheduler.state(day_index) == RebalanceState::Rebalancing {
                if let Some(flag) = &self.abort {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!(%date, day_index, "abort requested; stopping at rebalance boundary");
                        break;
                    }
                }
                let new_weights = self.rebalance(date, panel)?;
                let turnover = turnover(&weights, &new_weights);
                if !self.cost_bps.is_zero() && !turnover.is_zero() {
                    let cost = self.cost_bps / dec!(10000) * turnover;
                    value *= Decimal::ONE - cost;
                    tracing::debug!(%date, %turnover, %cost, "charged transaction costs");
                }
                weights = new_weights;
            }
            // HOLDING days fall through: weights carry forward unchanged.

            history.push(PortfolioState::from_weights(date, value, weights.clone()));

            // The explicit index shift: weights decided at dates[t] earn
            // the return realized from dates[t] to dates[t + 1]. The last
            // date has no following return and ends the simulation.
            if let Some(&next_date) = dates.get(day_index + 1) {
                let ret = portfolio_return(&weights, &closes, date, next_date)?;
                value *= Decimal::ONE + ret;
            }
        }

        Ok(history)
    }

    /// Computes the weight vector taking effect on `date`, using
    /// information up to and including `date` only.
    fn rebalance(
        &self,
        date: NaiveDate,
        panel: &BTreeMap<String, Vec<MarketBar>>,
    ) -> Result<BTreeMap<String, Decimal>, BacktestError> {
        let vols = match self.cfg.weighting {
            WeightingMethod::Equal => BTreeMap::new(),
            WeightingMethod::RiskParity => trailing_volatilities(panel, date, self.cfg.window),
        };
        let book = target_book(date, panel, &self.cfg, &self.filter, self.model.as_ref(), &vols)?;
        let book = self.guard.apply(book);
        Ok(book
            .into_iter()
            .map(|p| (p.symbol.clone(), p.signed_weight()))
            .collect())
    }
}

/// The union of all bar dates in the panel, sorted ascending. Day
/// indices for the cadence state machine are positions in this calendar.
fn trading_calendar(panel: &BTreeMap<String, Vec<MarketBar>>) -> Vec<NaiveDate> {
    let dates: BTreeSet<NaiveDate> = panel
        .values()
        .flat_map(|series| series.iter().map(|b| b.date))
        .collect();
    dates.into_iter().collect()
}

fn close_panel(
    panel: &BTreeMap<String, Vec<MarketBar>>,
) -> BTreeMap<String, BTreeMap<NaiveDate, Decimal>> {
    panel
        .iter()
        .map(|(symbol, series)| {
            (
                symbol.clone(),
                series.iter().map(|b| (b.date, b.close)).collect(),
            )
        })
        .collect()
}

/// Sum of absolute weight changes between two books.
fn turnover(old: &BTreeMap<String, Decimal>, new: &BTreeMap<String, Decimal>) -> Decimal {
    let symbols: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    symbols
        .into_iter()
        .map(|s| {
            let before = old.get(s).copied().unwrap_or(Decimal::ZERO);
            let after = new.get(s).copied().unwrap_or(Decimal::ZERO);
            (after - before).abs()
        })
        .sum()
}

/// The weighted portfolio return realized from `weight_date` to
/// `return_date`.
///
/// Refuses any pairing where the return is not strictly after the
/// decision. This is the lookahead-bias guard, enforced structurally
/// rather than by convention. A held symbol missing a close on either
/// date contributes zero return, logged rather than silently dropped.
fn portfolio_return(
    weights: &BTreeMap<String, Decimal>,
    closes: &BTreeMap<String, BTreeMap<NaiveDate, Decimal>>,
    weight_date: NaiveDate,
    return_date: NaiveDate,
) -> Result<Decimal, BacktestError> {
    if return_date <= weight_date {
        return Err(BacktestError::Lookahead {
            weight_date,
            return_date,
        });
    }

    let mut total = Decimal::ZERO;
    for (symbol, weight) in weights {
        if weight.is_zero() {
            continue;
        }
        let series = closes.get(symbol);
        let (from, to) = match series {
            Some(s) => (s.get(&weight_date), s.get(&return_date)),
            None => (None, None),
        };
        match (from, to) {
            (Some(&from), Some(&to)) if !from.is_zero() => {
                total += *weight * (to / from - Decimal::ONE);
            }
            _ => {
                tracing::warn!(
                    symbol,
                    %weight_date,
                    %return_date,
                    "missing close for held symbol; applying zero return"
                );
            }
        }
    }
    Ok(total)
}
