//! # Meridian Live Engine
//!
//! The orchestrator for one live rebalance cycle: synchronize holdings
//! with the exchange, compute the blended target book from fresh bar
//! history, diff targets against holdings, and work the resulting
//! instructions through the order executors under a bounded worker pool.
//!
//! ## Architectural Principles
//!
//! - **Exchange as source of truth:** every cycle starts from a fresh
//!   holdings sync. The engine carries no position state between cycles.
//! - **Failure isolation at the order level:** one instruction failing
//!   never takes down its siblings in the same cycle. A strategy whose
//!   evaluation fails aborts the cycle before any order is placed; a
//!   half-evaluated book must never reach the router.
//! - **Bounded concurrency:** at most `worker_pool_size` instructions are
//!   in flight at once, and the router emits at most one instruction per
//!   symbol, so no symbol is ever worked by two executors concurrently.

use api_client::MarketDataClient;
use backtester::{RebalanceScheduler, RebalanceState};
use chrono::{Datelike, NaiveDate, Utc};
use configuration::Config;
use core_types::{FillReport, OrderInstruction, Position, WeightingMethod};
use executor::{execute_instruction, ExecutionContext, ExecutionRouter};
use risk::ExposureGuard;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use strategies::{
    deduplicate, group_by_symbol, target_book, trailing_volatilities, FactorModel, UniverseFilter,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub mod error;
pub mod holdings;

pub use error::EngineError;
pub use holdings::{sync_account, AccountSnapshot};

/// The central orchestrator for live rebalancing.
pub struct LiveEngine {
    config: Config,
    data: Arc<dyn MarketDataClient>,
    ctx: Arc<ExecutionContext>,
    guard: ExposureGuard,
    model: Box<dyn FactorModel>,
}

impl LiveEngine {
    pub fn new(
        config: Config,
        data: Arc<dyn MarketDataClient>,
        ctx: Arc<ExecutionContext>,
        model: Box<dyn FactorModel>,
    ) -> Result<Self, EngineError> {
        let guard = ExposureGuard::new(config.risk.clone())?;
        Ok(Self {
            config,
            data,
            ctx,
            guard,
            model,
        })
    }

    /// Runs one full rebalance cycle and returns the fill reports of
    /// every instruction that was worked.
    pub async fn run_cycle(&self) -> Result<Vec<FillReport>, EngineError> {
        let today = Utc::now().date_naive();
        let snapshot = sync_account(
            &self.ctx.exchange,
            &self.ctx.retrier,
            &self.ctx.settings.quote_asset,
        )
        .await?;

        let panel = self.fetch_panel(today).await?;
        let targets = self.compute_targets(today, &panel)?;

        // Held symbols are priced from the sync; everything else falls
        // back to its latest close.
        let mut prices = snapshot.prices.clone();
        for (symbol, series) in &panel {
            if let Some(last) = series.last() {
                prices.entry(symbol.clone()).or_insert(last.close);
            }
        }

        let router = ExecutionRouter::new(self.ctx.settings.min_notional);
        let instructions = router.diff(
            &targets,
            &snapshot.weights,
            snapshot.equity,
            &prices,
            &self.ctx.settings.algorithm,
        );

        Ok(self.dispatch(instructions).await)
    }

    /// Fetches, deduplicates and groups the bar history every strategy in
    /// this cycle scores from.
    async fn fetch_panel(
        &self,
        today: chrono::NaiveDate,
    ) -> Result<BTreeMap<String, Vec<core_types::MarketBar>>, EngineError> {
        let lookback = self
            .config
            .strategies
            .iter()
            .map(|s| s.window)
            .max()
            .unwrap_or(1);
        // Calendar-day padding so a full window of trading bars exists
        // despite weekends and holidays.
        let start = today - chrono::Duration::days(lookback as i64 * 2 + 7);
        let bars = self
            .data
            .fetch_daily_bars(&self.config.data.symbols, start, today)
            .await?;
        Ok(group_by_symbol(deduplicate(bars)))
    }

    /// Evaluates every configured strategy at `date`, blends the books
    /// and applies the exposure caps, yielding the target signed weights.
    ///
    /// Each strategy is gated by its own rebalance cadence: on a holding
    /// day the book is evaluated at the strategy's most recent rebalance
    /// date instead of `date`, reproducing the weights decided then from
    /// the same immutable history. Daily cycles therefore leave a weekly
    /// strategy's book untouched between its rebalance dates, exactly as
    /// the simulator does.
    fn compute_targets(
        &self,
        date: NaiveDate,
        panel: &BTreeMap<String, Vec<core_types::MarketBar>>,
    ) -> Result<BTreeMap<String, Decimal>, EngineError> {
        let mut books: BTreeMap<String, Vec<Position>> = BTreeMap::new();
        for cfg in &self.config.strategies {
            let anchor = decision_date(date, cfg.rebalance_days);
            if anchor != date {
                tracing::info!(
                    strategy = %cfg.name,
                    %anchor,
                    "holding day; reproducing the book from the last rebalance date"
                );
            }
            let filter = UniverseFilter {
                min_volume: self.config.data.min_volume,
                min_history: cfg.window,
                min_market_cap: self.config.data.min_market_cap,
                market_caps: self.config.data.market_caps.clone(),
            };
            let vols = match cfg.weighting {
                WeightingMethod::Equal => BTreeMap::new(),
                WeightingMethod::RiskParity => trailing_volatilities(panel, anchor, cfg.window),
            };
            let book = target_book(anchor, panel, cfg, &filter, self.model.as_ref(), &vols)?;
            tracing::info!(strategy = %cfg.name, positions = book.len(), "computed strategy book");
            books.insert(cfg.name.clone(), book);
        }

        let blended = blender::blend(&books, &self.config.blend_weights)?;
        let capped = self.guard.apply(blended);
        Ok(capped
            .into_iter()
            .map(|p| (p.symbol.clone(), p.signed_weight()))
            .collect())
    }

    /// Works the instructions concurrently under the worker pool bound.
    ///
    /// The router emits at most one instruction per symbol, so the pool
    /// never has two executors fighting over one order book. A failed or
    /// panicked worker is logged and its siblings run to completion.
    async fn dispatch(&self, instructions: Vec<OrderInstruction>) -> Vec<FillReport> {
        let semaphore = Arc::new(Semaphore::new(self.ctx.settings.worker_pool_size));
        let mut workers = JoinSet::new();
        for instruction in instructions {
            let ctx = Arc::clone(&self.ctx);
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = execute_instruction(&ctx, &instruction).await;
                (instruction, outcome)
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((instruction, Ok(report))) => {
                    tracing::info!(
                        symbol = %report.symbol,
                        status = ?report.status,
                        filled = %report.filled_qty,
                        requested = %instruction.quantity,
                        "instruction finished"
                    );
                    reports.push(report);
                }
                Ok((instruction, Err(e))) => {
                    tracing::error!(symbol = %instruction.symbol, error = %e, "instruction failed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "execution worker panicked");
                }
            }
        }
        reports
    }
}

/// The date whose evaluation governs `date` under a strategy's cadence.
///
/// Live cycles run once per day, so the cadence counts calendar days from
/// a fixed epoch; the phase is stable across restarts for a given
/// cadence. A rebalance day is its own anchor; a holding day anchors to
/// the most recent rebalance day before it.
fn decision_date(date: NaiveDate, rebalance_days: usize) -> NaiveDate {
    let scheduler = RebalanceScheduler::new(rebalance_days);
    let day_index = date.num_days_from_ce() as usize;
    match scheduler.state(day_index) {
        RebalanceState::Rebalancing => date,
        RebalanceState::Holding => {
            date - chrono::Duration::days((day_index % rebalance_days) as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::error::ApiError;
    use api_client::{
        BalanceResponse, BookTicker, ExchangeClient, HoldingResponse, OrderAck, OrderState,
        RetryingClient,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use configuration::{
        DataSettings, ExecutionSettings, RetrySettings, RiskSettings, SimulationSettings,
        StrategyConfig,
    };
    use core_types::{
        Direction, ExecutionAlgorithm, FillStatus, MarketBar, OrderSide, WeightingMethod,
    };
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use strategies::TrailingReturn;

    /// Serves a fixed panel regardless of the requested range, with dates
    /// ending today so the evaluation date always has bars.
    struct FixedDataClient;

    #[async_trait]
    impl MarketDataClient for FixedDataClient {
        async fn fetch_daily_bars(
            &self,
            _symbols: &[String],
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<MarketBar>, ApiError> {
            let today = Utc::now().date_naive();
            let mut bars = Vec::new();
            for (symbol, closes) in [("AAA", [dec!(100), dec!(110), dec!(121)]),
                ("BBB", [dec!(100), dec!(90), dec!(81)])]
            {
                for (i, close) in closes.into_iter().enumerate() {
                    bars.push(MarketBar {
                        symbol: symbol.to_string(),
                        date: today - chrono::Duration::days((closes.len() - 1 - i) as i64),
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: dec!(100000),
                    });
                }
            }
            Ok(bars)
        }
    }

    /// A flat account with cash only; every placed order fills on poll.
    struct FlatExchange {
        placed: Mutex<Vec<(String, OrderSide, Decimal)>>,
        orders: Mutex<std::collections::HashMap<String, (Decimal, Decimal)>>,
        next_id: AtomicU32,
    }

    impl FlatExchange {
        fn new() -> Self {
            Self {
                placed: Mutex::new(Vec::new()),
                orders: Mutex::new(std::collections::HashMap::new()),
                next_id: AtomicU32::new(1),
            }
        }
    }

    #[async_trait]
    impl ExchangeClient for FlatExchange {
        async fn book_ticker(&self, _symbol: &str) -> Result<BookTicker, ApiError> {
            Ok(BookTicker {
                bid: dec!(120),
                ask: dec!(121),
            })
        }

        async fn place_limit_order(
            &self,
            symbol: &str,
            side: OrderSide,
            price: Decimal,
            quantity: Decimal,
        ) -> Result<OrderAck, ApiError> {
            self.placed
                .lock()
                .unwrap()
                .push((symbol.to_string(), side, quantity));
            let order_id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            self.orders
                .lock()
                .unwrap()
                .insert(order_id.clone(), (quantity, price));
            Ok(OrderAck {
                order_id,
                symbol: symbol.to_string(),
                side,
                state: OrderState::New,
                executed_qty: Decimal::ZERO,
                avg_price: None,
            })
        }

        async fn place_market_order(
            &self,
            symbol: &str,
            side: OrderSide,
            quantity: Decimal,
        ) -> Result<OrderAck, ApiError> {
            self.place_limit_order(symbol, side, dec!(121), quantity).await
        }

        async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError> {
            Ok(OrderAck {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
                side: OrderSide::Buy,
                state: OrderState::Canceled,
                executed_qty: Decimal::ZERO,
                avg_price: None,
            })
        }

        async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError> {
            let (quantity, price) = self
                .orders
                .lock()
                .unwrap()
                .get(order_id)
                .copied()
                .ok_or_else(|| ApiError::InvalidData("unknown order".to_string()))?;
            Ok(OrderAck {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
                side: OrderSide::Buy,
                state: OrderState::Filled,
                executed_qty: quantity,
                avg_price: Some(price),
            })
        }

        async fn balances(&self) -> Result<Vec<BalanceResponse>, ApiError> {
            Ok(vec![BalanceResponse {
                asset: "USDT".to_string(),
                available: dec!(10000),
            }])
        }

        async fn open_positions(&self) -> Result<Vec<HoldingResponse>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn config() -> Config {
        Config {
            data: DataSettings {
                base_url: "http://localhost".to_string(),
                symbols: vec!["AAA".to_string(), "BBB".to_string()],
                cache_dir: "/tmp".to_string(),
                cache_ttl_secs: 60,
                calls_per_minute: 600,
                batch_size: 20,
                retry: RetrySettings::default(),
                min_volume: Decimal::ZERO,
                min_market_cap: None,
                market_caps: BTreeMap::new(),
                api_timeout_secs: 30,
            },
            simulation: SimulationSettings {
                initial_capital: dec!(10000),
                cost_bps: Decimal::ZERO,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            },
            risk: RiskSettings {
                max_gross_exposure: dec!(5),
                max_position_weight: dec!(2),
            },
            execution: ExecutionSettings {
                base_url: "http://localhost".to_string(),
                min_notional: dec!(10),
                worker_pool_size: 4,
                api_timeout_secs: 5,
                tick_sizes: Default::default(),
                default_tick_size: dec!(0.01),
                quote_asset: "USDT".to_string(),
                algorithm: ExecutionAlgorithm::Twap {
                    slices: 2,
                    duration_secs: 10,
                },
            },
            strategies: vec![StrategyConfig {
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
            }],
            blend_weights: BTreeMap::from([("xs_momentum".to_string(), Decimal::ONE)]),
        }
    }

    fn engine_with(cfg: Config, exchange: Arc<FlatExchange>) -> LiveEngine {
        let ctx = Arc::new(ExecutionContext::new(
            exchange,
            RetryingClient::new(RetrySettings::default()),
            cfg.execution.clone(),
        ));
        LiveEngine::new(cfg, Arc::new(FixedDataClient), ctx, Box::new(TrailingReturn)).unwrap()
    }

    fn engine(exchange: Arc<FlatExchange>) -> LiveEngine {
        engine_with(config(), exchange)
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_buys_winners_and_sells_losers() {
        let exchange = Arc::new(FlatExchange::new());
        let reports = engine(exchange.clone()).run_cycle().await.unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.status == FillStatus::Filled));

        let placed = exchange.placed.lock().unwrap();
        let sides: BTreeMap<&str, OrderSide> = placed
            .iter()
            .map(|(symbol, side, _)| (symbol.as_str(), *side))
            .collect();
        assert_eq!(sides["AAA"], OrderSide::Buy);
        assert_eq!(sides["BBB"], OrderSide::Sell);
    }

    #[test]
    fn cadence_anchors_hold_between_rebalances() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let anchors: Vec<NaiveDate> = (0..14)
            .map(|i| decision_date(start + chrono::Duration::days(i), 7))
            .collect();
        // Fourteen days under a weekly cadence visit exactly two anchors,
        // each a fixed point of the mapping.
        let distinct: std::collections::BTreeSet<&NaiveDate> = anchors.iter().collect();
        assert_eq!(distinct.len(), 2);
        for anchor in &distinct {
            assert_eq!(decision_date(**anchor, 7), **anchor);
        }
        for (i, anchor) in anchors.iter().enumerate() {
            let date = start + chrono::Duration::days(i as i64);
            assert!(*anchor <= date);
            assert!((date - *anchor).num_days() < 7);
        }
    }

    #[test]
    fn daily_cadence_rebalances_every_day() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for i in 0..5 {
            let date = start + chrono::Duration::days(i);
            assert_eq!(decision_date(date, 1), date);
        }
    }

    #[test]
    fn holding_days_reproduce_the_anchor_book() {
        // Pin down a rebalance day for a two-day cadence, then flip the
        // ranking on the following (holding) day.
        let mut anchor = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        if decision_date(anchor, 2) != anchor {
            anchor = anchor.succ_opt().unwrap();
        }
        let holding = anchor.succ_opt().unwrap();

        let bar = |symbol: &str, date: NaiveDate, close: Decimal| MarketBar {
            symbol: symbol.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(100000),
        };
        let day_before = anchor.pred_opt().unwrap();
        let panel = BTreeMap::from([
            (
                "AAA".to_string(),
                vec![
                    bar("AAA", day_before, dec!(100)),
                    bar("AAA", anchor, dec!(121)),
                    bar("AAA", holding, dec!(50)),
                ],
            ),
            (
                "BBB".to_string(),
                vec![
                    bar("BBB", day_before, dec!(100)),
                    bar("BBB", anchor, dec!(81)),
                    bar("BBB", holding, dec!(200)),
                ],
            ),
        ]);

        let mut cfg = config();
        cfg.strategies[0].rebalance_days = 2;
        let engine = engine_with(cfg, Arc::new(FlatExchange::new()));

        let at_anchor = engine.compute_targets(anchor, &panel).unwrap();
        let at_holding = engine.compute_targets(holding, &panel).unwrap();

        // The holding day keeps the anchor's ranking even though the
        // fresh bars would invert it.
        assert_eq!(at_anchor, at_holding);
        assert!(at_holding["AAA"] > Decimal::ZERO);
        assert!(at_holding["BBB"] < Decimal::ZERO);
    }

    #[tokio::test]
    async fn flat_account_weights_are_empty_and_equity_is_cash() {
        let exchange: Arc<dyn ExchangeClient> = Arc::new(FlatExchange::new());
        let retrier = RetryingClient::new(RetrySettings::default());
        let snapshot = sync_account(&exchange, &retrier, "USDT").await.unwrap();

        assert_eq!(snapshot.cash, dec!(10000));
        assert_eq!(snapshot.equity, dec!(10000));
        assert!(snapshot.weights.is_empty());
    }

    /// A held position is re-expressed as a signed weight of equity.
    struct HoldingExchange;

    #[async_trait]
    impl ExchangeClient for HoldingExchange {
        async fn book_ticker(&self, _symbol: &str) -> Result<BookTicker, ApiError> {
            Ok(BookTicker {
                bid: dec!(99),
                ask: dec!(101),
            })
        }
        async fn place_limit_order(
            &self,
            _symbol: &str,
            _side: OrderSide,
            _price: Decimal,
            _quantity: Decimal,
        ) -> Result<OrderAck, ApiError> {
            Err(ApiError::InvalidData("not under test".to_string()))
        }
        async fn place_market_order(
            &self,
            _symbol: &str,
            _side: OrderSide,
            _quantity: Decimal,
        ) -> Result<OrderAck, ApiError> {
            Err(ApiError::InvalidData("not under test".to_string()))
        }
        async fn cancel_order(&self, _symbol: &str, _order_id: &str) -> Result<OrderAck, ApiError> {
            Err(ApiError::InvalidData("not under test".to_string()))
        }
        async fn order_status(&self, _symbol: &str, _order_id: &str) -> Result<OrderAck, ApiError> {
            Err(ApiError::InvalidData("not under test".to_string()))
        }
        async fn balances(&self) -> Result<Vec<BalanceResponse>, ApiError> {
            Ok(vec![BalanceResponse {
                asset: "USDT".to_string(),
                available: dec!(5000),
            }])
        }
        async fn open_positions(&self) -> Result<Vec<HoldingResponse>, ApiError> {
            Ok(vec![HoldingResponse {
                symbol: "AAA".to_string(),
                quantity: dec!(-10),
                entry_price: dec!(95),
            }])
        }
    }

    #[tokio::test]
    async fn short_holdings_produce_negative_weights() {
        let exchange: Arc<dyn ExchangeClient> = Arc::new(HoldingExchange);
        let retrier = RetryingClient::new(RetrySettings::default());
        let snapshot = sync_account(&exchange, &retrier, "USDT").await.unwrap();

        // Short 10 units at mid 100: notional -1000, equity 4000.
        assert_eq!(snapshot.equity, dec!(4000));
        assert_eq!(snapshot.weights["AAA"], dec!(-0.25));
        assert_eq!(snapshot.prices["AAA"], dec!(100));
    }
}
