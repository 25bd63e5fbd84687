//! Float helpers for `no_std` builds.
//!
//! The Magnus formula needs a natural logarithm and the configured output
//! precision needs decimal rounding; neither is available on `f32` without a
//! float runtime. `ln` uses base-2 range reduction and an atanh series on the
//! mantissa, accurate to well under 1e-6 relative over the normal range.

use core::f32::consts::LN_2;

/// Natural logarithm. Returns NaN for `x <= 0`.
pub(crate) fn ln(x: f32) -> f32 {
    if !(x > 0.0) || !x.is_finite() {
        return if x == f32::INFINITY { f32::INFINITY } else { f32::NAN };
    }

    // Scale subnormals into the normal range first.
    let (x, sub_exp) = if x < f32::MIN_POSITIVE {
        (x * 8_388_608.0, -23i32) // 2^23
    } else {
        (x, 0)
    };

    let bits = x.to_bits();
    let exp = ((bits >> 23) & 0xff) as i32 - 127 + sub_exp;
    // Mantissa normalized into [1, 2)
    let m = f32::from_bits((bits & 0x007f_ffff) | 0x3f80_0000);

    // ln(m) = 2 atanh(z) with z = (m - 1) / (m + 1), |z| <= 1/3
    let z = (m - 1.0) / (m + 1.0);
    let z2 = z * z;
    let series = z * (1.0 + z2 * (1.0 / 3.0 + z2 * (0.2 + z2 * (1.0 / 7.0 + z2 / 9.0))));

    2.0 * series + exp as f32 * LN_2
}

/// Round to `digits` decimal places, half away from zero.
pub(crate) fn round_to(value: f32, digits: u8) -> f32 {
    let mut scale = 1.0f32;
    for _ in 0..digits {
        scale *= 10.0;
    }
    let scaled = value * scale;
    // Casting truncates toward zero, so shift by half a unit first.
    let shifted = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
    (shifted as i64) as f32 / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32, tol: f32) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn ln_reference_values() {
        assert_close(ln(1.0), 0.0, 1e-7);
        assert_close(ln(0.5), -core::f32::consts::LN_2, 1e-6);
        assert_close(ln(2.0), core::f32::consts::LN_2, 1e-6);
        assert_close(ln(core::f32::consts::E), 1.0, 1e-5);
        assert_close(ln(10.0), core::f32::consts::LN_10, 1e-5);
        assert_close(ln(0.01), -4.605_170, 1e-4);
    }

    #[test]
    fn ln_dense_grid_matches_std() {
        let mut x = 0.001f32;
        while x < 100.0 {
            let expected = (x as f64).ln() as f32;
            let rel = (ln(x) - expected).abs() / expected.abs().max(1e-3);
            assert!(rel < 1e-5, "ln({x}): got {}, want {}", ln(x), expected);
            x *= 1.07;
        }
    }

    #[test]
    fn ln_domain_edges() {
        assert!(ln(0.0).is_nan());
        assert!(ln(-1.0).is_nan());
        assert!(ln(f32::NAN).is_nan());
    }

    #[test]
    fn rounding_half_away_from_zero() {
        assert_eq!(round_to(9.2567, 2), 9.26);
        assert_eq!(round_to(9.2532, 2), 9.25);
        assert_eq!(round_to(-1.236, 2), -1.24);
        assert_eq!(round_to(7.0, 0), 7.0);
    }
}
