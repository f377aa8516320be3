//! # Meridian Executor Crate
//!
//! Turns the gap between target and current holdings into order
//! instructions (`ExecutionRouter`) and works those instructions against
//! the exchange through one of three algorithms behind a single
//! `OrderExecutor` trait.
//!
//! ## Architectural Principles
//!
//! - **One trait, three state machines:** AggressiveLadder, TWAP and
//!   SpreadOffset share the tick-rounding, price-validation and
//!   fill-accounting code; only the order placement choreography differs.
//! - **Failure isolation:** a permanent rejection abandons exactly one
//!   instruction. Its partial fills are reported, its siblings in the
//!   same rebalance batch are untouched.
//! - **Bounded waiting:** every suspension point (exchange round trips,
//!   per-step waits, slice intervals) has a finite timeout. There is no
//!   unbounded retry anywhere in an executor.

use api_client::error::ApiError;
use api_client::{ExchangeClient, OrderAck, OrderState, RetryingClient};
use async_trait::async_trait;
use configuration::ExecutionSettings;
use core_types::{FillReport, OrderInstruction, OrderSide};
use rust_decimal::Decimal;
use std::sync::Arc;

pub mod aggressive;
pub mod error;
pub mod fills;
pub mod price;
pub mod router;
pub mod spread_offset;
pub mod twap;

// Re-export the key components to provide a clean, public-facing API.
pub use aggressive::AggressiveLadder;
pub use error::ExecutionError;
pub use price::{final_price, round_to_tick};
pub use router::ExecutionRouter;
pub use spread_offset::SpreadOffset;
pub use twap::Twap;

/// Everything an executor needs to talk to the exchange: the client, the
/// retry discipline for transient submission errors, and the execution
/// settings (tick sizes, minimum notional).
pub struct ExecutionContext {
    pub exchange: Arc<dyn ExchangeClient>,
    pub retrier: RetryingClient,
    pub settings: ExecutionSettings,
}

impl ExecutionContext {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        retrier: RetryingClient,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            exchange,
            retrier,
            settings,
        }
    }

    /// Places a limit order through the retry layer.
    pub(crate) async fn place_limit(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<OrderAck, ApiError> {
        self.retrier
            .call(|| {
                self.exchange
                    .place_limit_order(symbol, side, price, quantity)
            })
            .await
    }

    pub(crate) async fn place_market(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderAck, ApiError> {
        self.retrier
            .call(|| self.exchange.place_market_order(symbol, side, quantity))
            .await
    }
}

/// The common interface of the three execution algorithms.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Works one instruction to completion, cancellation or abandonment.
    /// The report always reflects every fill that actually happened.
    async fn execute(&self, instruction: &OrderInstruction) -> Result<FillReport, ExecutionError>;
}

/// Dispatches an instruction to the executor its algorithm tag names.
pub async fn execute_instruction(
    ctx: &ExecutionContext,
    instruction: &OrderInstruction,
) -> Result<FillReport, ExecutionError> {
    use core_types::ExecutionAlgorithm as Algo;
    match &instruction.algorithm {
        Algo::Aggressive { .. } => AggressiveLadder::new(ctx).execute(instruction).await,
        Algo::Twap { .. } => Twap::new(ctx).execute(instruction).await,
        Algo::SpreadOffset { .. } => SpreadOffset::new(ctx).execute(instruction).await,
    }
}

/// Whether an order ack signals a permanent rejection.
pub(crate) fn is_rejected(ack: &OrderAck) -> bool {
    ack.state == OrderState::Rejected
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use api_client::{BalanceResponse, BookTicker, HoldingResponse};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// How the fake exchange resolves resting orders.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum FillMode {
        FillOnPoll,
        NeverFill,
    }

    #[derive(Debug, Clone)]
    pub struct PlacedOrder {
        pub symbol: String,
        pub side: OrderSide,
        pub price: Option<Decimal>,
        pub quantity: Decimal,
        pub is_market: bool,
    }

    /// A deterministic in-memory exchange for executor tests.
    pub struct MockExchange {
        pub book: BookTicker,
        pub fill_mode: FillMode,
        pub placed: Mutex<Vec<PlacedOrder>>,
        pub cancelled: AtomicU32,
        orders: Mutex<HashMap<String, PlacedOrder>>,
        next_id: AtomicU32,
    }

    impl MockExchange {
        pub fn new(bid: Decimal, ask: Decimal, fill_mode: FillMode) -> Self {
            Self {
                book: BookTicker { bid, ask },
                fill_mode,
                placed: Mutex::new(Vec::new()),
                cancelled: AtomicU32::new(0),
                orders: Mutex::new(HashMap::new()),
                next_id: AtomicU32::new(1),
            }
        }

        fn admit(&self, order: PlacedOrder) -> String {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            self.placed.lock().unwrap().push(order.clone());
            self.orders.lock().unwrap().insert(id.clone(), order);
            id
        }

        pub fn limit_prices(&self) -> Vec<Decimal> {
            self.placed
                .lock()
                .unwrap()
                .iter()
                .filter_map(|o| o.price)
                .collect()
        }
    }

    #[async_trait]
    impl ExchangeClient for MockExchange {
        async fn book_ticker(&self, _symbol: &str) -> Result<BookTicker, ApiError> {
            Ok(self.book)
        }

        async fn place_limit_order(
            &self,
            symbol: &str,
            side: OrderSide,
            price: Decimal,
            quantity: Decimal,
        ) -> Result<OrderAck, ApiError> {
            let order = PlacedOrder {
                symbol: symbol.to_string(),
                side,
                price: Some(price),
                quantity,
                is_market: false,
            };
            let order_id = self.admit(order);
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
            let fill_price = match side {
                OrderSide::Buy => self.book.ask,
                OrderSide::Sell => self.book.bid,
            };
            let order_id = self.admit(PlacedOrder {
                symbol: symbol.to_string(),
                side,
                price: None,
                quantity,
                is_market: true,
            });
            Ok(OrderAck {
                order_id,
                symbol: symbol.to_string(),
                side,
                state: OrderState::Filled,
                executed_qty: quantity,
                avg_price: Some(fill_price),
            })
        }

        async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError> {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            let order = self.orders.lock().unwrap().get(order_id).cloned();
            let order = order.ok_or_else(|| ApiError::InvalidData("unknown order".to_string()))?;
            Ok(OrderAck {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
                side: order.side,
                state: OrderState::Canceled,
                executed_qty: Decimal::ZERO,
                avg_price: None,
            })
        }

        async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError> {
            let order = self.orders.lock().unwrap().get(order_id).cloned();
            let order = order.ok_or_else(|| ApiError::InvalidData("unknown order".to_string()))?;
            let (state, executed, avg) = match self.fill_mode {
                FillMode::FillOnPoll => (OrderState::Filled, order.quantity, order.price),
                FillMode::NeverFill => (OrderState::New, Decimal::ZERO, None),
            };
            Ok(OrderAck {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
                side: order.side,
                state,
                executed_qty: executed,
                avg_price: avg,
            })
        }

        async fn balances(&self) -> Result<Vec<BalanceResponse>, ApiError> {
            Ok(Vec::new())
        }

        async fn open_positions(&self) -> Result<Vec<HoldingResponse>, ApiError> {
            Ok(Vec::new())
        }
    }

    pub fn context(exchange: Arc<MockExchange>) -> ExecutionContext {
        ExecutionContext::new(
            exchange,
            RetryingClient::new(configuration::RetrySettings::default()),
            ExecutionSettings {
                base_url: "http://localhost".to_string(),
                min_notional: Decimal::from(10),
                worker_pool_size: 4,
                api_timeout_secs: 5,
                tick_sizes: Default::default(),
                default_tick_size: Decimal::new(1, 2), // 0.01
                quote_asset: "USDT".to_string(),
                algorithm: core_types::ExecutionAlgorithm::Twap {
                    slices: 4,
                    duration_secs: 60,
                },
            },
        )
    }
}
