//! # Meridian Backtester
//!
//! Simulates a strategy's target weights over historical bars to produce
//! an append-only portfolio history.
//!
//! The two correctness rules this crate exists to enforce:
//!
//! 1. **Cadence:** weights are recomputed only on rebalance dates
//!    (`day_index % rebalance_days == 0`, day 0 included) and carried
//!    forward unchanged on holding days, identical to the live cadence,
//!    so simulated and live parameterization cannot drift.
//! 2. **No lookahead:** the return applied at day T is the realized
//!    return from T to T+1 against weights decided at T. The simulator
//!    indexes the two dates explicitly and refuses a return whose date is
//!    not strictly after the decision date.

pub mod error;
pub mod scheduler;
pub mod simulator;

pub use error::BacktestError;
pub use scheduler::{RebalanceScheduler, RebalanceState};
pub use simulator::PortfolioSimulator;
