/// The scheduler's two states, one per trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceState {
    Rebalancing,
    Holding,
}

/// Decides, per strategy cadence, whether a trading-day index is a
/// rebalance date. Day 0 is always a rebalance; thereafter every
/// `rebalance_days`-th day. There is no calendar arithmetic here on
/// purpose: the cadence counts trading days, so weekends and holidays
/// never shift the pattern between a backtest and a live run.
#[derive(Debug, Clone, Copy)]
pub struct RebalanceScheduler {
    rebalance_days: usize,
}

impl RebalanceScheduler {
    pub fn new(rebalance_days: usize) -> Self {
        assert!(rebalance_days > 0, "rebalance_days must be at least 1");
        Self { rebalance_days }
    }

    pub fn state(&self, day_index: usize) -> RebalanceState {
        if day_index % self.rebalance_days == 0 {
            RebalanceState::Rebalancing
        } else {
            RebalanceState::Holding
        }
    }
}
