//! Standard normal CDF (via the `statrs` error function).

use std::f64::consts::SQRT_2;

use statrs::function::erf::erfc;

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.959_963_984_540_054;

/// Two-sided 80% normal quantile.
pub const Z_80: f64 = 1.281_551_565_544_600_4;

/// `Φ(x)`.
pub fn std_normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    0.5 * erfc(-x / SQRT_2)
}
