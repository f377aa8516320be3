//! The shared accumulation primitive.
//!
//! Two historically bug-prone places, deduplicating alternate spellings
//! of one asset in the universe and netting one symbol across several
//! strategies' books, are both "collapse many rows into one per key".
//! They share `fold_by_key` so a fix in one place is a fix in both.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Folds an item stream into one value per key. The fold function
/// receives the accumulated value and the incoming item and returns the
/// new accumulated value. `BTreeMap` keeps iteration order deterministic.
pub fn fold_by_key<K, V, I, KF, FF>(items: I, key_fn: KF, fold_fn: FF) -> BTreeMap<K, V>
where
    K: Ord,
    I: IntoIterator<Item = V>,
    KF: Fn(&V) -> K,
    FF: Fn(V, V) -> V,
{
    let mut out: BTreeMap<K, V> = BTreeMap::new();
    for item in items {
        let key = key_fn(&item);
        match out.remove(&key) {
            Some(existing) => {
                out.insert(key, fold_fn(existing, item));
            }
            None => {
                out.insert(key, item);
            }
        }
    }
    out
}

/// Sums signed weights per symbol. This is the blender's netting rule: a
/// symbol held by two strategies becomes one combined exposure.
pub fn net_by_symbol<I>(entries: I) -> BTreeMap<String, Decimal>
where
    I: IntoIterator<Item = (String, Decimal)>,
{
    fold_by_key(
        entries,
        |(symbol, _)| symbol.clone(),
        |(symbol, a), (_, b)| (symbol, a + b),
    )
    .into_iter()
    .map(|(_, (symbol, weight))| (symbol, weight))
    .collect()
}

/// Canonicalizes a ticker so that alternate spellings of one economic
/// asset ("BRK.B", "BRK-B", "brk b") compare equal.
pub fn canonical_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '/' | ' ' | '_'))
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn netting_combines_repeated_symbols() {
        let netted = net_by_symbol(vec![
            ("ETHUSDT".to_string(), dec!(0.25)),
            ("BTCUSDT".to_string(), dec!(0.5)),
            ("ETHUSDT".to_string(), dec!(-0.10)),
        ]);
        assert_eq!(netted.len(), 2);
        assert_eq!(netted["ETHUSDT"], dec!(0.15));
        assert_eq!(netted["BTCUSDT"], dec!(0.5));
    }

    #[test]
    fn canonical_symbol_collapses_spellings() {
        assert_eq!(canonical_symbol("BRK.B"), canonical_symbol("BRK-B"));
        assert_eq!(canonical_symbol("brk b"), "BRKB");
        assert_ne!(canonical_symbol("BRK.B"), canonical_symbol("BRK.A"));
    }

    #[test]
    fn fold_by_key_keeps_single_items_untouched() {
        let folded = fold_by_key(vec![1_i64, 2, 3], |v| *v, |a, _| a);
        assert_eq!(folded.len(), 3);
    }
}
