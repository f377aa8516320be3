use crate::error::ExecutionError;
use crate::fills::FillAccumulator;
use crate::price::final_price;
use crate::{is_rejected, ExecutionContext, OrderExecutor};
use api_client::OrderState;
use async_trait::async_trait;
use core_types::{ExecutionAlgorithm, FillReport, OrderInstruction, OrderSide};
use rust_decimal::Decimal;
use std::time::Duration;

/// The aggressive price ladder.
///
/// Starts at the best price on our own side of the book (join the bid
/// when buying, the ask when selling). Each time the order sits unfilled
/// for `wait_secs`, the remainder is cancelled and re-placed one tick
/// closer to the opposing side, up to `max_steps` times. If the ladder
/// runs out and `force_completion` is set, the remainder goes out as a
/// marketable order.
pub struct AggressiveLadder<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> AggressiveLadder<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl OrderExecutor for AggressiveLadder<'_> {
    async fn execute(&self, instruction: &OrderInstruction) -> Result<FillReport, ExecutionError> {
        let ExecutionAlgorithm::Aggressive {
            wait_secs,
            max_steps,
            force_completion,
        } = instruction.algorithm
        else {
            return Err(ExecutionError::AlgorithmMismatch(format!(
                "{:?} routed to AggressiveLadder",
                instruction.algorithm
            )));
        };

        let symbol = instruction.symbol.as_str();
        let tick = self.ctx.settings.tick_size(symbol);
        let mut fills = FillAccumulator::new(instruction.quantity);

        for step in 0..=max_steps {
            let book = self
                .ctx
                .retrier
                .call(|| self.ctx.exchange.book_ticker(symbol))
                .await?;

            // Step from our side of the book toward the spread.
            let offset = tick * Decimal::from(step);
            let raw = match instruction.side {
                OrderSide::Buy => book.bid + offset,
                OrderSide::Sell => book.ask - offset,
            };
            let limit = final_price(symbol, raw, tick)?;

            let ack = match self
                .ctx
                .place_limit(symbol, instruction.side, limit, fills.remaining())
                .await
            {
                Ok(ack) if is_rejected(&ack) => {
                    tracing::error!(symbol, %limit, "order rejected; abandoning instruction");
                    return Ok(fills.report(instruction));
                }
                Ok(ack) => ack,
                Err(e) => {
                    tracing::error!(symbol, error = %e, "order submission failed permanently; abandoning instruction");
                    return Ok(fills.report(instruction));
                }
            };

            tokio::time::sleep(Duration::from_secs(wait_secs)).await;

            let status = self
                .ctx
                .retrier
                .call(|| self.ctx.exchange.order_status(symbol, &ack.order_id))
                .await?;
            if status.state == OrderState::Filled {
                fills.record(&status, limit);
                break;
            }

            // Timed out at this rung: cancel before re-pricing, keeping
            // whatever partial fill the cancel reports.
            let cancelled = self
                .ctx
                .retrier
                .call(|| self.ctx.exchange.cancel_order(symbol, &ack.order_id))
                .await?;
            fills.record(&cancelled, limit);
            if fills.is_complete() {
                break;
            }
            tracing::debug!(symbol, step, %limit, "ladder step timed out; stepping toward spread");
        }

        if !fills.is_complete() && force_completion {
            tracing::info!(symbol, remaining = %fills.remaining(), "ladder exhausted; forcing completion at market");
            match self
                .ctx
                .place_market(symbol, instruction.side, fills.remaining())
                .await
            {
                Ok(ack) => fills.record(&ack, instruction.target_price),
                Err(e) => {
                    tracing::error!(symbol, error = %e, "forced completion failed; abandoning remainder");
                }
            }
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
    use std::sync::Arc;
    use uuid::Uuid;

    fn instruction(force_completion: bool) -> OrderInstruction {
        OrderInstruction {
            instruction_id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            target_price: dec!(100),
            quantity: dec!(2),
            algorithm: ExecutionAlgorithm::Aggressive {
                wait_secs: 3,
                max_steps: 2,
                force_completion,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fills_at_the_first_rung_when_the_market_cooperates() {
        let exchange = Arc::new(MockExchange::new(dec!(100), dec!(100.05), FillMode::FillOnPoll));
        let ctx = context(exchange.clone());

        let report = AggressiveLadder::new(&ctx)
            .execute(&instruction(false))
            .await
            .unwrap();

        assert_eq!(report.status, FillStatus::Filled);
        assert_eq!(report.filled_qty, dec!(2));
        assert_eq!(exchange.limit_prices(), vec![dec!(100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn steps_one_tick_toward_the_spread_per_timeout() {
        let exchange = Arc::new(MockExchange::new(dec!(100), dec!(100.05), FillMode::NeverFill));
        let ctx = context(exchange.clone());

        let report = AggressiveLadder::new(&ctx)
            .execute(&instruction(false))
            .await
            .unwrap();

        // Three rungs (step 0..=2), each one tick more aggressive.
        assert_eq!(
            exchange.limit_prices(),
            vec![dec!(100.00), dec!(100.01), dec!(100.02)]
        );
        assert_eq!(report.status, FillStatus::Abandoned);
        assert_eq!(report.filled_qty, Decimal::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn force_completion_submits_a_marketable_order() {
        let exchange = Arc::new(MockExchange::new(dec!(100), dec!(100.05), FillMode::NeverFill));
        let ctx = context(exchange.clone());

        let report = AggressiveLadder::new(&ctx)
            .execute(&instruction(true))
            .await
            .unwrap();

        assert_eq!(report.status, FillStatus::Filled);
        assert_eq!(report.filled_qty, dec!(2));
        // Filled at the ask by the final market order.
        assert_eq!(report.avg_price, Some(dec!(100.05)));
        let placed = exchange.placed.lock().unwrap();
        assert!(placed.last().unwrap().is_market);
    }
}
