//! Utility functions and macros used across the library

/// Compare two scalars with tolerance (default tolerance is `EPSILON`)
#[doc(hidden)]
#[macro_export]
macro_rules! assert_approx_eq {
    ( $v0:expr, $v1: expr ) => {{
        assert!(($v0 - $v1).abs() < $crate::EPSILON, "{} != {}", $v0, $v1);
    }};
    ( $v0:expr, $v1: expr, $e: expr ) => {{
        assert!(($v0 - $v1).abs() < $e, "{} != {}", $v0, $v1);
    }};
}

/// Round a scalar to the nearest non-negative integer
#[inline]
pub(crate) fn round_to_usize(value: f64) -> usize {
    if value.is_finite() && value > 0.0 {
        value.round() as usize
    } else {
        0
    }
}
