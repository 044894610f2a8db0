//! Factor effect function
//!
//! Maps a 1-5 factor score to a positive multiplicative effect on risk odds.
//!
//! Global invariants enforced:
//! - Score 3 is neutral: effect is exactly 1.0 for every direction and strength
//! - Protective effects fall as the score rises, exposure effects rise
//! - Effects are always strictly positive (base floored at 0.2)

use crate::catalog::{Direction, Strength};

/// Score at which no factor moves a risk
pub const NEUTRAL_SCORE: i32 = 3;

/// Lower bound on the base ratio before the strength exponent is applied
pub const BASE_FLOOR: f64 = 0.2;

/// Multiplicative effect of a factor score on a risk's odds
///
/// With `d = score − 3`, protective base is `3 / (3 + d)` and exposure base is
/// `(3 + d) / 3`. The base is floored at [`BASE_FLOOR`] and raised to the
/// strength exponent. Scores outside 1-5 are not rejected; the floor keeps the
/// result finite and positive, and a protective factor scored at or below
/// zero takes the floor.
pub fn factor_effect(score: i32, direction: Direction, strength: Strength) -> f64 {
    let neutral = f64::from(NEUTRAL_SCORE);
    let shifted = f64::from(score);

    let base = match direction {
        // 3 / (3 + d) has no positive value once 3 + d <= 0
        Direction::Protective if shifted <= 0.0 => BASE_FLOOR,
        Direction::Protective => neutral / shifted,
        Direction::Exposure => shifted / neutral,
    };

    base.max(BASE_FLOOR).powf(strength.exponent())
}

/// Human label for an effect value
pub fn effect_label(effect: f64) -> &'static str {
    if effect < 0.9 {
        "reduces"
    } else if effect > 1.1 {
        "increases"
    } else {
        "neutral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_neutral_score_is_identity() {
        for strength in Strength::ALL {
            assert_eq!(factor_effect(3, Direction::Protective, strength), 1.0);
            assert_eq!(factor_effect(3, Direction::Exposure, strength), 1.0);
        }
    }

    #[test]
    fn test_protective_values() {
        assert!(approx(factor_effect(5, Direction::Protective, Strength::Medium), 0.6));
        assert!(approx(factor_effect(1, Direction::Protective, Strength::Medium), 3.0));
        assert!(approx(factor_effect(5, Direction::Protective, Strength::Critical), 0.36));
        assert!(approx(
            factor_effect(4, Direction::Protective, Strength::Low),
            0.75_f64.sqrt()
        ));
    }

    #[test]
    fn test_exposure_values() {
        assert!(approx(factor_effect(5, Direction::Exposure, Strength::Medium), 5.0 / 3.0));
        assert!(approx(factor_effect(1, Direction::Exposure, Strength::Medium), 1.0 / 3.0));
        assert!(approx(factor_effect(1, Direction::Exposure, Strength::Critical), 1.0 / 9.0));
    }

    #[test]
    fn test_monotonic_in_score() {
        for strength in Strength::ALL {
            for score in 1..5 {
                let p_lo = factor_effect(score, Direction::Protective, strength);
                let p_hi = factor_effect(score + 1, Direction::Protective, strength);
                assert!(p_hi < p_lo, "protective effect must fall as score rises");

                let e_lo = factor_effect(score, Direction::Exposure, strength);
                let e_hi = factor_effect(score + 1, Direction::Exposure, strength);
                assert!(e_hi > e_lo, "exposure effect must rise with score");
            }
        }
    }

    #[test]
    fn test_stronger_moves_further_from_neutral() {
        let low = factor_effect(5, Direction::Exposure, Strength::Low);
        let crit = factor_effect(5, Direction::Exposure, Strength::Critical);
        assert!(crit > low && low > 1.0);
    }

    #[test]
    fn test_out_of_range_scores_stay_positive() {
        assert!(factor_effect(0, Direction::Exposure, Strength::High) > 0.0);
        assert!(factor_effect(-4, Direction::Exposure, Strength::High) > 0.0);
        assert!(approx(
            factor_effect(0, Direction::Protective, Strength::Medium),
            BASE_FLOOR
        ));
        assert!(factor_effect(40, Direction::Protective, Strength::High) > 0.0);
        // 3/(3+d) at large d bottoms out at the floor
        assert!(approx(
            factor_effect(40, Direction::Protective, Strength::Medium),
            BASE_FLOOR
        ));
    }

    #[test]
    fn test_effect_label() {
        assert_eq!(effect_label(0.5), "reduces");
        assert_eq!(effect_label(1.0), "neutral");
        assert_eq!(effect_label(1.05), "neutral");
        assert_eq!(effect_label(2.0), "increases");
    }
}
