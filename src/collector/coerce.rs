//! Null-safe coercion of scanned values into metric-ready primitives.
//!
//! All functions are total: a missing value degrades to a neutral default
//! (`0.0` or `""`) instead of dropping the sample it belongs to.

/// Nullable float to metric value. `None` becomes `0.0`.
#[inline]
pub fn float_or_zero(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

/// Nullable integer to metric value. `None` becomes `0.0`.
#[inline]
pub fn int_or_zero(value: Option<i64>) -> f64 {
    value.map_or(0.0, |v| v as f64)
}

/// Nullable string to label value. `None` becomes the empty string.
#[inline]
pub fn string_or_empty(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// Nullable float rendered as a label value. `None` becomes the empty string.
pub fn float_label(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Conversion of a nullable scanned value into its metric-safe form.
pub trait Coerce {
    /// Metric-safe output type.
    type Output;

    /// Apply the null policy for this type.
    fn coerce(self) -> Self::Output;
}

impl Coerce for Option<f64> {
    type Output = f64;

    fn coerce(self) -> f64 {
        float_or_zero(self)
    }
}

impl Coerce for Option<i64> {
    type Output = f64;

    fn coerce(self) -> f64 {
        int_or_zero(self)
    }
}

impl Coerce for Option<String> {
    type Output = String;

    fn coerce(self) -> String {
        string_or_empty(self)
    }
}
