use crate::error::ExecutionError;
use crate::fills::FillAccumulator;
use crate::price::final_price;
use crate::{is_rejected, ExecutionContext, OrderExecutor};
use api_client::OrderState;
use async_trait::async_trait;
use core_types::{ExecutionAlgorithm, FillReport, OrderInstruction, OrderSide};
use rust_decimal::Decimal;
use std::time::Duration;

/// Time-weighted average price execution.
///
/// Splits the quantity into `slices` equal child orders spread evenly
/// over `duration_secs`. Each slice rests passively at the touch for its
/// interval; whatever has not filled by then is cancelled before the next
/// slice goes out, so at most one child order rests at a time.
pub struct Twap<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> Twap<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl OrderExecutor for Twap<'_> {
    async fn execute(&self, instruction: &OrderInstruction) -> Result<FillReport, ExecutionError> {
        let ExecutionAlgorithm::Twap {
            slices,
            duration_secs,
        } = instruction.algorithm
        else {
            return Err(ExecutionError::AlgorithmMismatch(format!(
                "{:?} routed to Twap",
                instruction.algorithm
            )));
        };

        let symbol = instruction.symbol.as_str();
        let tick = self.ctx.settings.tick_size(symbol);
        let slices = slices.max(1);
        let interval = Duration::from_secs(duration_secs / u64::from(slices));
        let slice_qty = instruction.quantity / Decimal::from(slices);
        let mut fills = FillAccumulator::new(instruction.quantity);

        for slice in 0..slices {
            // The last slice takes the remainder so rounding in the
            // division above never loses quantity.
            let qty = if slice == slices - 1 {
                fills.remaining()
            } else {
                slice_qty.min(fills.remaining())
            };
            if qty.is_zero() {
                break;
            }

            let book = self
                .ctx
                .retrier
                .call(|| self.ctx.exchange.book_ticker(symbol))
                .await?;
            let raw = match instruction.side {
                OrderSide::Buy => book.bid,
                OrderSide::Sell => book.ask,
            };
            let limit = final_price(symbol, raw, tick)?;

            let ack = match self.ctx.place_limit(symbol, instruction.side, limit, qty).await {
                Ok(ack) if is_rejected(&ack) => {
                    tracing::error!(symbol, slice, %limit, "slice rejected; abandoning instruction");
                    return Ok(fills.report(instruction));
                }
                Ok(ack) => ack,
                Err(e) => {
                    tracing::error!(symbol, slice, error = %e, "slice submission failed permanently; abandoning instruction");
                    return Ok(fills.report(instruction));
                }
            };

            tokio::time::sleep(interval).await;

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
            tracing::debug!(symbol, slice, %limit, "slice interval elapsed without a full fill");
        }

        Ok(fills.report(instruction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, FillMode, MockExchange};
    use core_types::FillStatus;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use uuid::Uuid;

    fn instruction(quantity: Decimal) -> OrderInstruction {
        OrderInstruction {
            instruction_id: Uuid::new_v4(),
            symbol: "ETHUSDT".to_string(),
            side: OrderSide::Buy,
            target_price: dec!(100),
            quantity,
            algorithm: ExecutionAlgorithm::Twap {
                slices: 4,
                duration_secs: 60,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slices_sum_to_the_requested_quantity() {
        let exchange = Arc::new(MockExchange::new(dec!(100), dec!(100.05), FillMode::FillOnPoll));
        let ctx = context(exchange.clone());

        let report = Twap::new(&ctx).execute(&instruction(dec!(10))).await.unwrap();

        let placed = exchange.placed.lock().unwrap();
        assert_eq!(placed.len(), 4);
        let total: Decimal = placed.iter().map(|o| o.quantity).sum();
        assert_eq!(total, dec!(10));
        assert_eq!(report.status, FillStatus::Filled);
        assert_eq!(report.filled_qty, dec!(10));
    }

    #[tokio::test(start_paused = true)]
    async fn slices_rest_at_the_passive_touch() {
        let exchange = Arc::new(MockExchange::new(dec!(99.994), dec!(100.05), FillMode::FillOnPoll));
        let ctx = context(exchange.clone());

        Twap::new(&ctx).execute(&instruction(dec!(8))).await.unwrap();

        // Buys join the bid, tick-rounded.
        assert_eq!(exchange.limit_prices(), vec![dec!(99.99); 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn unfilled_slices_are_cancelled_and_reported_abandoned() {
        let exchange = Arc::new(MockExchange::new(dec!(100), dec!(100.05), FillMode::NeverFill));
        let ctx = context(exchange.clone());

        let report = Twap::new(&ctx).execute(&instruction(dec!(10))).await.unwrap();

        assert_eq!(exchange.cancelled.load(Ordering::SeqCst), 4);
        assert_eq!(report.status, FillStatus::Abandoned);
        assert_eq!(report.filled_qty, Decimal::ZERO);
    }
}
