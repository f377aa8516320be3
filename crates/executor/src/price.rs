use crate::error::ExecutionError;
use rust_decimal::Decimal;

/// Rounds a price to the instrument's tick size. Every executor submits
/// through this; there is exactly one rounding implementation.
pub fn round_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size.is_zero() {
        return price;
    }
    (price / tick_size).round() * tick_size
}

/// Rounds and validates a computed limit price. A non-positive result is
/// an error that drops the instruction, never a clamp to some arbitrary
/// floor, which would submit at a price nobody chose.
pub fn final_price(
    symbol: &str,
    raw: Decimal,
    tick_size: Decimal,
) -> Result<Decimal, ExecutionError> {
    let rounded = round_to_tick(raw, tick_size);
    if rounded <= Decimal::ZERO {
        tracing::error!(symbol, %raw, %rounded, "computed non-positive limit price");
        return Err(ExecutionError::NonPositivePrice {
            symbol: symbol.to_string(),
            price: rounded,
        });
    }
    Ok(rounded)
}
