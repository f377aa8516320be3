use crate::error::ExecutionError;
use crate::fills::FillAccumulator;
use crate::price::final_price;
use crate::{is_rejected, ExecutionContext, OrderExecutor};
use api_client::{OrderAck, OrderState};
use async_trait::async_trait;
use core_types::{ExecutionAlgorithm, FillReport, OrderInstruction, OrderSide};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// How long resting offset orders are given before the remainder is
/// cancelled.
const PATIENCE_SECS: u64 = 120;

/// Patient liquidity capture.
///
/// Rests a multiple of the current spread away from the touch (below the
/// bid when buying, above the ask when selling) and waits for the market
/// to come to us. Large orders are split 50/50 across two offset levels,
/// the configured multiplier and twice it, so part of the order still
/// fills on a shallow excursion.
pub struct SpreadOffset<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> SpreadOffset<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }

    fn offset_price(side: OrderSide, bid: Decimal, ask: Decimal, multiplier: Decimal) -> Decimal {
        let spread = ask - bid;
        match side {
            OrderSide::Buy => bid - spread * multiplier,
            OrderSide::Sell => ask + spread * multiplier,
        }
    }
}

#[async_trait]
impl OrderExecutor for SpreadOffset<'_> {
    async fn execute(&self, instruction: &OrderInstruction) -> Result<FillReport, ExecutionError> {
        let ExecutionAlgorithm::SpreadOffset {
            multiplier,
            split_threshold,
        } = instruction.algorithm
        else {
            return Err(ExecutionError::AlgorithmMismatch(format!(
                "{:?} routed to SpreadOffset",
                instruction.algorithm
            )));
        };

        let symbol = instruction.symbol.as_str();
        let tick = self.ctx.settings.tick_size(symbol);
        let book = self
            .ctx
            .retrier
            .call(|| self.ctx.exchange.book_ticker(symbol))
            .await?;

        // Decide the levels and validate every price before placing
        // anything, so a bad price aborts the whole instruction instead
        // of leaving one leg resting.
        let notional = instruction.quantity * instruction.target_price;
        let half_notional = notional / dec!(2);
        let split = notional >= split_threshold && half_notional >= self.ctx.settings.min_notional;
        let mut levels: Vec<(Decimal, Decimal)> = Vec::new();
        if split {
            let half = instruction.quantity / dec!(2);
            for m in [multiplier, multiplier * dec!(2)] {
                let raw = Self::offset_price(instruction.side, book.bid, book.ask, m);
                levels.push((final_price(symbol, raw, tick)?, half));
            }
            tracing::debug!(symbol, %notional, "splitting across two offset levels");
        } else {
            let raw = Self::offset_price(instruction.side, book.bid, book.ask, multiplier);
            levels.push((final_price(symbol, raw, tick)?, instruction.quantity));
        }

        let mut fills = FillAccumulator::new(instruction.quantity);
        let mut resting: Vec<(OrderAck, Decimal)> = Vec::new();
        for (limit, qty) in levels {
            match self.ctx.place_limit(symbol, instruction.side, limit, qty).await {
                Ok(ack) if is_rejected(&ack) => {
                    tracing::error!(symbol, %limit, "offset order rejected");
                }
                Ok(ack) => resting.push((ack, limit)),
                Err(e) => {
                    tracing::error!(symbol, %limit, error = %e, "offset order submission failed permanently");
                }
            }
        }
        if resting.is_empty() {
            return Ok(fills.report(instruction));
        }

        tokio::time::sleep(Duration::from_secs(PATIENCE_SECS)).await;

        for (ack, limit) in resting {
            let status = self
                .ctx
                .retrier
                .call(|| self.ctx.exchange.order_status(symbol, &ack.order_id))
                .await?;
            if status.state == OrderState::Filled {
                fills.record(&status, limit);
                continue;
            }
            let cancelled = self
                .ctx
                .retrier
                .call(|| self.ctx.exchange.cancel_order(symbol, &ack.order_id))
                .await?;
            fills.record(&cancelled, limit);
            tracing::debug!(symbol, %limit, "patience elapsed; offset remainder cancelled");
        }

        Ok(fills.report(instruction))
    }
}
