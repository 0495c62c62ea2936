//! Standard-drink estimation.
//!
//! Quantities are ounces. One standard drink is roughly 12 oz of beer, 5 oz of
//! wine or 1 oz of spirits; cocktails count like wine, seltzers like beer.

use tracing::trace;

use crate::structs::drink_entry::{DrinkType, Unit};

/// Millilitres per US fluid ounce, as used when converting classifier guesses.
pub const ML_PER_OZ: f64 = 29.57;

/// Standard drinks per ounce for a category.
pub fn per_ounce_rate(drink_type: DrinkType) -> f64 {
    match drink_type {
        DrinkType::Spirits => 1.0,
        DrinkType::Wine | DrinkType::Cocktail => 1.0 / 5.0,
        DrinkType::Beer | DrinkType::Seltzer => 1.0 / 12.0,
        DrinkType::Other => 1.0 / 12.0,
    }
}

/// Estimates the whole number of standard drinks in a pour.
///
/// Total over every input: non-finite or non-positive quantities are zero
/// intake, and any positive quantity counts as at least one drink, so the
/// result jumps from 0 to 1 just above zero.
///
/// `unit` is expected to be ounces already (see [`normalize_from_guess`]);
/// other units are taken at face value.
pub fn estimate(drink_type: DrinkType, quantity: f64, unit: Unit) -> f64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0.0;
    }

    if unit != Unit::Oz {
        trace!(%unit, "estimating a quantity that was not normalized to ounces");
    }

    (quantity * per_ounce_rate(drink_type)).round().max(1.0)
}

/// Brings a guessed pour into canonical units. Millilitres become ounces,
/// everything else passes through unchanged.
pub fn normalize_from_guess(
    drink_type: DrinkType,
    quantity: f64,
    unit: Unit,
) -> (DrinkType, f64, Unit) {
    match unit {
        Unit::Ml => (drink_type, quantity / ML_PER_OZ, Unit::Oz),
        _ => (drink_type, quantity, unit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_standard_drink_per_reference_pour() {
        assert_eq!(estimate(DrinkType::Spirits, 1.0, Unit::Oz), 1.0);
        assert_eq!(estimate(DrinkType::Beer, 12.0, Unit::Oz), 1.0);
        assert_eq!(estimate(DrinkType::Wine, 5.0, Unit::Oz), 1.0);
        assert_eq!(estimate(DrinkType::Cocktail, 5.0, Unit::Oz), 1.0);
        assert_eq!(estimate(DrinkType::Seltzer, 12.0, Unit::Oz), 1.0);
    }

    #[test]
    fn rounds_to_nearest_whole_drink() {
        assert_eq!(estimate(DrinkType::Beer, 32.0, Unit::Oz), 3.0);
        assert_eq!(estimate(DrinkType::Wine, 12.0, Unit::Oz), 2.0);
        assert_eq!(estimate(DrinkType::Spirits, 2.5, Unit::Oz), 3.0);
    }

    #[test]
    fn small_pour_counts_as_one() {
        assert_eq!(estimate(DrinkType::Beer, 0.01, Unit::Oz), 1.0);
        assert_eq!(estimate(DrinkType::Wine, 2.0, Unit::Oz), 1.0);
    }

    #[test]
    fn non_positive_or_non_finite_is_zero() {
        for ty in DrinkType::ALL {
            assert_eq!(estimate(ty, 0.0, Unit::Oz), 0.0);
            assert_eq!(estimate(ty, -5.0, Unit::Oz), 0.0);
            assert_eq!(estimate(ty, f64::NAN, Unit::Oz), 0.0);
            assert_eq!(estimate(ty, f64::INFINITY, Unit::Oz), 0.0);
            assert_eq!(estimate(ty, f64::NEG_INFINITY, Unit::Oz), 0.0);
        }
    }

    #[test]
    fn unknown_type_uses_other_rate() {
        let unknown = DrinkType::parse_lossy("unknown-type");
        assert_eq!(
            estimate(unknown, 12.0, Unit::Oz),
            estimate(DrinkType::Other, 12.0, Unit::Oz)
        );
    }

    #[test]
    fn normalize_converts_only_millilitres() {
        let (ty, qty, unit) = normalize_from_guess(DrinkType::Wine, 147.85, Unit::Ml);
        assert_eq!(ty, DrinkType::Wine);
        assert_eq!(unit, Unit::Oz);
        assert!((qty - 5.0).abs() < 1e-9);

        assert_eq!(
            normalize_from_guess(DrinkType::Beer, 2.0, Unit::Pint),
            (DrinkType::Beer, 2.0, Unit::Pint)
        );
    }

    proptest! {
        #[test]
        fn positive_pour_is_never_zero(idx in 0usize..6, qty in 1e-6f64..10_000.0) {
            let ty = DrinkType::ALL[idx];
            prop_assert!(estimate(ty, qty, Unit::Oz) >= 1.0);
        }

        #[test]
        fn estimate_is_a_whole_number(idx in 0usize..6, qty in -100.0f64..10_000.0) {
            let std = estimate(DrinkType::ALL[idx], qty, Unit::Oz);
            prop_assert_eq!(std, std.trunc());
            prop_assert!(std >= 0.0);
        }
    }
}
