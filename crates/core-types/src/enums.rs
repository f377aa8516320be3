use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The side of a portfolio position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Returns the opposite side of the book.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// The side of an order sent to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side of the order.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// How a strategy reads the factor ranking.
///
/// `Momentum` goes long the top of the ranking and short the bottom;
/// `MeanReversion` is the exact swap. The selection routine consumes this
/// as a single invert flag so the two can never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Momentum,
    MeanReversion,
}

impl Direction {
    /// Whether the long/short tails are swapped relative to the ranking.
    pub fn is_inverted(&self) -> bool {
        matches!(self, Direction::MeanReversion)
    }
}

/// How selected candidates are weighted within one side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    Equal,
    RiskParity,
}

/// The order-execution algorithm an instruction is routed to, together
/// with its parameters.
///
/// Keeping the parameters inside the variant makes an instruction fully
/// self-describing: an executor never has to consult global state to know
/// how it should work an order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ExecutionAlgorithm {
    /// Start at the best price on our side and step toward the spread on
    /// every timeout, optionally crossing at the end.
    Aggressive {
        wait_secs: u64,
        max_steps: u32,
        force_completion: bool,
    },
    /// Split the quantity into equal slices spread over a time window.
    Twap { slices: u32, duration_secs: u64 },
    /// Rest a multiple of the spread away from the touch.
    SpreadOffset {
        multiplier: Decimal,
        /// Quantities at or above this notional are split across two
        /// offset levels; below it the order stays whole.
        split_threshold: Decimal,
    },
}

/// Terminal state of one order instruction after its executor has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStatus {
    Filled,
    PartiallyFilled,
    Abandoned,
}
