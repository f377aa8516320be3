use crate::error::EngineError;
use api_client::{ExchangeClient, RetryingClient};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The account's state as reported by the exchange, reduced to the signed
/// weight space the rest of the engine works in.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub cash: Decimal,
    pub equity: Decimal,
    /// Mid price per held symbol, captured during the sync.
    pub prices: BTreeMap<String, Decimal>,
    /// Current signed weight per held symbol.
    pub weights: BTreeMap<String, Decimal>,
}

/// Fetches balances and open positions and reconstructs equity and signed
/// weights from the exchange's numbers. The exchange is the source of
/// truth; nothing is carried over from a previous cycle.
pub async fn sync_account(
    exchange: &Arc<dyn ExchangeClient>,
    retrier: &RetryingClient,
    quote_asset: &str,
) -> Result<AccountSnapshot, EngineError> {
    let (balances, holdings) = tokio::join!(
        retrier.call(|| exchange.balances()),
        retrier.call(|| exchange.open_positions())
    );
    let balances = balances?;
    let holdings = holdings?;

    let cash = match balances.iter().find(|b| b.asset == quote_asset) {
        Some(balance) => balance.available,
        None => {
            tracing::warn!(quote_asset, "no quote asset balance on the account");
            Decimal::ZERO
        }
    };

    let mut prices = BTreeMap::new();
    let mut notionals = BTreeMap::new();
    for holding in holdings.iter().filter(|h| !h.quantity.is_zero()) {
        let book = retrier
            .call(|| exchange.book_ticker(&holding.symbol))
            .await?;
        let mid = (book.bid + book.ask) / Decimal::TWO;
        prices.insert(holding.symbol.clone(), mid);
        notionals.insert(holding.symbol.clone(), holding.quantity * mid);
    }

    let equity = cash + notionals.values().copied().sum::<Decimal>();
    if equity <= Decimal::ZERO {
        return Err(EngineError::NonPositiveEquity(equity));
    }
    let weights: BTreeMap<String, Decimal> = notionals
        .into_iter()
        .map(|(symbol, notional)| (symbol, notional / equity))
        .collect();

    tracing::info!(
        %cash,
        %equity,
        positions = weights.len(),
        "synchronized account state with exchange"
    );
    Ok(AccountSnapshot {
        cash,
        equity,
        prices,
        weights,
    })
}
