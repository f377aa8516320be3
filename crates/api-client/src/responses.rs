use core_types::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-of-book quote for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookTicker {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BookTicker {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// Lifecycle state of an exchange order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

/// The exchange's acknowledgement of a placed, queried or cancelled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub state: OrderState,
    pub executed_qty: Decimal,
    /// Average fill price so far; absent while nothing has filled.
    pub avg_price: Option<Decimal>,
}

/// A single asset balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub asset: String,
    pub available: Decimal,
}

/// An open position as reported by the exchange. Quantity is signed:
/// negative for shorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingResponse {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
}
