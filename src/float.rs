/// The floating point type used throughout the renderer. Radiance values,
/// ray parameters and texture samples all share this precision.
pub type Float = f32;

pub const PI: Float = std::f32::consts::PI;
pub const INV_PI: Float = std::f32::consts::FRAC_1_PI;

/// Largest value strictly below 1.0; handy for keeping samples inside [0, 1).
pub const ONE_MINUS_EPSILON: Float = 1.0 - Float::EPSILON / 2.0;

#[inline]
pub fn lerp(t: Float, a: Float, b: Float) -> Float {
    a + t * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_minus_epsilon_below_one() {
        assert!(ONE_MINUS_EPSILON < 1.0);
        assert!(ONE_MINUS_EPSILON > 0.9999);
    }

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp(0.0, 2.0, 8.0), 2.0);
        assert_eq!(lerp(1.0, 2.0, 8.0), 8.0);
        assert_eq!(lerp(0.5, 2.0, 8.0), 5.0);
    }
}
