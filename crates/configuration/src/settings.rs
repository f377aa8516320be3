use crate::error::ConfigError;
use chrono::NaiveDate;
use core_types::{Direction, ExecutionAlgorithm, WeightingMethod};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataSettings,
    pub simulation: SimulationSettings,
    pub risk: RiskSettings,
    pub execution: ExecutionSettings,
    /// One record per strategy instance, keyed by strategy name.
    pub strategies: Vec<StrategyConfig>,
    /// Fraction of capital allocated to each strategy; must sum to 1.
    pub blend_weights: BTreeMap<String, Decimal>,
}

impl Config {
    /// Validates every section. Called by `load_config` so an invalid
    /// file never reaches component construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one strategy must be configured".to_string(),
            ));
        }
        for strategy in &self.strategies {
            strategy.validate()?;
        }
        let blend_total: Decimal = self.blend_weights.values().copied().sum();
        if (blend_total - Decimal::ONE).abs() > dec!(0.000001) {
            return Err(ConfigError::Invalid(format!(
                "blend weights sum to {blend_total}, expected 1"
            )));
        }
        for strategy in &self.strategies {
            if !self.blend_weights.contains_key(&strategy.name) {
                return Err(ConfigError::Invalid(format!(
                    "strategy '{}' has no blend weight",
                    strategy.name
                )));
            }
        }
        self.data.validate()?;
        self.risk.validate()?;
        Ok(())
    }
}

/// Parameters for upstream data access: caching, rate limiting and retry.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    /// Base URL of the historical data API.
    pub base_url: String,
    /// The tradable universe: symbols whose history is fetched and ranked.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Directory the JSON cache snapshot is persisted under.
    pub cache_dir: String,
    /// Cache time-to-live in seconds. Entries also expire at midnight
    /// regardless of this value when same-day data is required.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Upstream allowance, in calls per minute, shared by every caller.
    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute: u32,
    /// Maximum symbols per batched history request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retry: RetrySettings,
    /// Minimum average daily volume for a symbol to enter the universe.
    #[serde(default)]
    pub min_volume: Decimal,
    /// Minimum market capitalization for universe admission; unset
    /// disables the check.
    #[serde(default)]
    pub min_market_cap: Option<Decimal>,
    /// Per-symbol market capitalizations backing the floor above.
    #[serde(default)]
    pub market_caps: BTreeMap<String, Decimal>,
    /// Timeout applied to every history round trip, in seconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
}

impl DataSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid(
                "data.symbols must list at least one symbol".to_string(),
            ));
        }
        if self.calls_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "data.calls_per_minute must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > 20 {
            return Err(ConfigError::Invalid(
                "data.batch_size must be between 1 and 20".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry discipline for transient upstream failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    /// Initial delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after every failed attempt.
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 500,
            backoff_factor: 2.0,
        }
    }
}

/// Contains parameters for a backtest run.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSettings {
    /// The initial starting capital for the simulation.
    pub initial_capital: Decimal,
    /// Linear transaction cost, in basis points of turnover, charged on
    /// rebalance days only. Zero disables the cost model.
    #[serde(default)]
    pub cost_bps: Decimal,
    /// The default start date for the backtest period.
    pub start_date: NaiveDate,
    /// The default end date for the backtest period.
    pub end_date: NaiveDate,
}

/// Portfolio-level risk caps. Breaches scale weights down rather than
/// aborting the run.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    /// Maximum allowed sum of absolute weights.
    #[serde(default = "default_max_gross")]
    pub max_gross_exposure: Decimal,
    /// Maximum absolute weight for any single position.
    #[serde(default = "default_max_position")]
    pub max_position_weight: Decimal,
}

impl RiskSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_gross_exposure <= Decimal::ZERO || self.max_position_weight <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "risk caps must be strictly positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters for live order routing and execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSettings {
    /// Base URL of the exchange trading API.
    pub base_url: String,
    /// Deltas below this notional are dropped as dust.
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
    /// Upper bound on concurrently working symbol workers.
    #[serde(default = "default_worker_pool")]
    pub worker_pool_size: usize,
    /// Timeout applied to every exchange round trip, in seconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    /// Per-symbol price increments; symbols not listed fall back to
    /// `default_tick_size`.
    #[serde(default)]
    pub tick_sizes: BTreeMap<String, Decimal>,
    #[serde(default = "default_tick_size")]
    pub default_tick_size: Decimal,
    /// Asset the account is quoted in; its available balance is cash.
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Algorithm every routed instruction is worked with.
    #[serde(default = "default_algorithm")]
    pub algorithm: ExecutionAlgorithm,
}

impl ExecutionSettings {
    /// The price increment for a symbol.
    pub fn tick_size(&self, symbol: &str) -> Decimal {
        self.tick_sizes
            .get(symbol)
            .copied()
            .unwrap_or(self.default_tick_size)
    }
}

/// The full parameter set for one strategy instance. Immutable once
/// constructed; every field is validated before use.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    /// Trailing bars handed to the factor model.
    pub window: usize,
    /// Trading days between rebalances.
    pub rebalance_days: usize,
    /// Percentile at or below which the lower tail is selected.
    pub long_pct: Decimal,
    /// Percentile at or above which the upper tail is selected.
    pub short_pct: Decimal,
    #[serde(default = "default_weighting")]
    pub weighting: WeightingMethod,
    /// Target sum of absolute weights on the long side.
    #[serde(default = "default_alloc")]
    pub long_alloc: Decimal,
    /// Target sum of absolute weights on the short side.
    #[serde(default = "default_alloc")]
    pub short_alloc: Decimal,
    /// Cap on positions per side.
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    pub direction: Direction,
}

impl StrategyConfig {
    /// Rejects parameter combinations that cannot produce a coherent
    /// book, in particular thresholds that would let the long and short
    /// tails overlap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidStrategy {
            strategy: self.name.clone(),
            reason,
        };
        if self.window == 0 {
            return Err(invalid("window must be at least 1".to_string()));
        }
        if self.rebalance_days == 0 {
            return Err(invalid("rebalance_days must be at least 1".to_string()));
        }
        let hundred = dec!(100);
        for (field, value) in [("long_pct", self.long_pct), ("short_pct", self.short_pct)] {
            if value < Decimal::ZERO || value > hundred {
                return Err(invalid(format!("{field} {value} outside [0, 100]")));
            }
        }
        if self.long_pct >= self.short_pct {
            return Err(invalid(format!(
                "long_pct {} must be below short_pct {} or the tails overlap",
                self.long_pct, self.short_pct
            )));
        }
        if self.long_alloc < Decimal::ZERO || self.short_alloc < Decimal::ZERO {
            return Err(invalid("allocations must be non-negative".to_string()));
        }
        if self.max_positions == 0 {
            return Err(invalid("max_positions must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn default_cache_ttl_secs() -> u64 {
    21_600 // six hours
}

fn default_calls_per_minute() -> u32 {
    30
}

fn default_batch_size() -> usize {
    20
}

fn default_max_gross() -> Decimal {
    dec!(2.0)
}

fn default_max_position() -> Decimal {
    dec!(0.25)
}

fn default_min_notional() -> Decimal {
    dec!(10)
}

fn default_worker_pool() -> usize {
    8
}

fn default_api_timeout() -> u64 {
    30
}

fn default_tick_size() -> Decimal {
    dec!(0.01)
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_algorithm() -> ExecutionAlgorithm {
    ExecutionAlgorithm::Twap {
        slices: 4,
        duration_secs: 3600,
    }
}

fn default_weighting() -> WeightingMethod {
    WeightingMethod::Equal
}

fn default_alloc() -> Decimal {
    Decimal::ONE
}

fn default_max_positions() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_strategy() -> StrategyConfig {
        StrategyConfig {
            name: "xs_momentum".to_string(),
            window: 90,
            rebalance_days: 7,
            long_pct: dec!(20),
            short_pct: dec!(80),
            weighting: WeightingMethod::Equal,
            long_alloc: Decimal::ONE,
            short_alloc: Decimal::ONE,
            max_positions: 10,
            direction: Direction::Momentum,
        }
    }

    #[test]
    fn valid_strategy_passes() {
        assert!(base_strategy().validate().is_ok());
    }

    #[test]
    fn crossed_thresholds_are_rejected() {
        let mut cfg = base_strategy();
        cfg.long_pct = dec!(80);
        cfg.short_pct = dec!(20);
        assert!(cfg.validate().is_err());

        cfg.long_pct = dec!(50);
        cfg.short_pct = dec!(50);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let mut cfg = base_strategy();
        cfg.rebalance_days = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn data_defaults_fill_in() {
        let cfg: DataSettings = serde_json::from_str(
            r#"{
                "base_url": "http://localhost",
                "cache_dir": "/tmp"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.api_timeout_secs, 30);
        assert_eq!(cfg.min_market_cap, None);
        assert!(cfg.market_caps.is_empty());
        assert_eq!(cfg.cache_ttl_secs, 21_600);
    }

    #[test]
    fn strategy_defaults_fill_in() {
        let cfg: StrategyConfig = serde_json::from_str(
            r#"{
                "name": "carry",
                "window": 30,
                "rebalance_days": 1,
                "long_pct": 10,
                "short_pct": 90,
                "direction": "mean_reversion"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.weighting, WeightingMethod::Equal);
        assert_eq!(cfg.long_alloc, Decimal::ONE);
        assert_eq!(cfg.max_positions, 20);
        assert!(cfg.validate().is_ok());
    }
}
