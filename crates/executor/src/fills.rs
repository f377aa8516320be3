use api_client::OrderAck;
use core_types::{FillReport, FillStatus, OrderInstruction};
use rust_decimal::Decimal;

/// Accumulates fills across the child orders of one instruction and
/// produces the final `FillReport`.
///
/// Partial fills are recorded here the moment they are known, on fill
/// polls and on cancel acknowledgements, so an abandoned instruction
/// still reports exactly what it did get done.
#[derive(Debug)]
pub struct FillAccumulator {
    requested: Decimal,
    filled: Decimal,
    notional: Decimal,
}

impl FillAccumulator {
    pub fn new(requested: Decimal) -> Self {
        Self {
            requested,
            filled: Decimal::ZERO,
            notional: Decimal::ZERO,
        }
    }

    /// Records the executed portion of a child order. `fallback_price`
    /// covers exchanges that omit the average price on cancels.
    pub fn record(&mut self, ack: &OrderAck, fallback_price: Decimal) {
        if ack.executed_qty.is_zero() {
            return;
        }
        let price = ack.avg_price.unwrap_or(fallback_price);
        self.filled += ack.executed_qty;
        self.notional += ack.executed_qty * price;
    }

    pub fn remaining(&self) -> Decimal {
        (self.requested - self.filled).max(Decimal::ZERO)
    }

    pub fn is_complete(&self) -> bool {
        self.filled >= self.requested
    }

    pub fn report(&self, instruction: &OrderInstruction) -> FillReport {
        let status = if self.filled.is_zero() {
            FillStatus::Abandoned
        } else if self.filled < self.requested {
            FillStatus::PartiallyFilled
        } else {
            FillStatus::Filled
        };
        FillReport {
            instruction_id: instruction.instruction_id,
            symbol: instruction.symbol.clone(),
            requested_qty: self.requested,
            filled_qty: self.filled,
            avg_price: (!self.filled.is_zero()).then(|| self.notional / self.filled),
            status,
        }
    }
}
