use crate::error::RiskError;
use configuration::RiskSettings;
use core_types::Position;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Enforces the gross-exposure and per-position caps by proportional
/// scale-down.
#[derive(Debug, Clone)]
pub struct ExposureGuard {
    params: RiskSettings,
}

impl ExposureGuard {
    pub fn new(params: RiskSettings) -> Result<Self, RiskError> {
        if params.max_gross_exposure <= Decimal::ZERO {
            return Err(RiskError::InvalidParameters(
                "max_gross_exposure must be positive".to_string(),
            ));
        }
        if params.max_position_weight <= Decimal::ZERO {
            return Err(RiskError::InvalidParameters(
                "max_position_weight must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// Scales the whole book down until both caps hold.
    ///
    /// The scale factor is the tightest of the two constraints, applied
    /// uniformly so the book keeps its shape. A factor of 1 means the
    /// book was already within limits and is returned untouched.
    pub fn apply(&self, mut positions: Vec<Position>) -> Vec<Position> {
        let gross: Decimal = positions.iter().map(|p| p.weight.abs()).sum();
        let largest: Decimal = positions
            .iter()
            .map(|p| p.weight.abs())
            .max()
            .unwrap_or(Decimal::ZERO);

        let mut scale = Decimal::ONE;
        if gross > self.params.max_gross_exposure {
            scale = scale.min(self.params.max_gross_exposure / gross);
        }
        if largest > self.params.max_position_weight {
            scale = scale.min(self.params.max_position_weight / largest);
        }

        if scale < Decimal::ONE {
            // Severity escalates with how far past the cap the book went.
            let breach = Decimal::ONE / scale;
            if breach > dec!(1.5) {
                tracing::error!(
                    %gross,
                    %largest,
                    %scale,
                    "risk caps breached badly; scaling all target weights down"
                );
            } else {
                tracing::warn!(
                    %gross,
                    %largest,
                    %scale,
                    "risk caps breached; scaling all target weights down"
                );
            }
            for p in &mut positions {
                p.weight *= scale;
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Side;

    fn position(symbol: &str, weight: Decimal, side: Side) -> Position {
        Position {
            symbol: symbol.to_string(),
            weight,
            side,
        }
    }

    fn guard(max_gross: Decimal, max_position: Decimal) -> ExposureGuard {
        ExposureGuard::new(RiskSettings {
            max_gross_exposure: max_gross,
            max_position_weight: max_position,
        })
        .unwrap()
    }

    #[test]
    fn book_within_caps_is_untouched() {
        let book = vec![
            position("AAA", dec!(0.5), Side::Long),
            position("BBB", dec!(0.5), Side::Short),
        ];
        let out = guard(dec!(2.0), dec!(0.6)).apply(book.clone());
        assert_eq!(out, book);
    }

    #[test]
    fn gross_breach_scales_proportionally() {
        let book = vec![
            position("AAA", dec!(1.5), Side::Long),
            position("BBB", dec!(1.5), Side::Short),
        ];
        let out = guard(dec!(2.0), dec!(1.5)).apply(book);
        let gross: Decimal = out.iter().map(|p| p.weight.abs()).sum();
        assert!((gross - dec!(2.0)).abs() < dec!(0.000001));
        // Shape preserved: both legs stay equal.
        assert_eq!(out[0].weight, out[1].weight);
    }

    #[test]
    fn position_cap_binds_when_tighter() {
        let book = vec![
            position("AAA", dec!(0.8), Side::Long),
            position("BBB", dec!(0.2), Side::Long),
        ];
        let out = guard(dec!(2.0), dec!(0.4)).apply(book);
        assert_eq!(out[0].weight, dec!(0.4));
        assert_eq!(out[1].weight, dec!(0.1));
    }

    #[test]
    fn invalid_caps_are_rejected() {
        assert!(ExposureGuard::new(RiskSettings {
            max_gross_exposure: Decimal::ZERO,
            max_position_weight: dec!(0.25),
        })
        .is_err());
    }
}
