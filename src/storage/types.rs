//! Row model shared by every data source.
//!
//! - [`Scalar`]: One nullable column value (null, integer, float or text)
//! - [`Row`]: Ordered column values of one result row
//!
//! Typed accessors on [`Row`] return `Ok(None)` for SQL `NULL`, so callers
//! always see a value paired with its validity. Conversions that would lose
//! meaning (text that is not a number read as a float) are reported as
//! [`ScanError::TypeMismatch`] and make the whole row unusable.

use serde::{Deserialize, Serialize};

use crate::storage::ScanError;

/// A single nullable column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    /// SQL `NULL`.
    Null,
    /// Integer column.
    Int(i64),
    /// Floating point or decimal column.
    Float(f64),
    /// Character column.
    Text(String),
}

impl Scalar {
    fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Int(v) => format!("int {v}"),
            Self::Float(v) => format!("float {v}"),
            Self::Text(v) => format!("'{v}'"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One result row: column values in select-list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<Scalar>,
}

impl Row {
    /// Create a row from its column values.
    pub fn new(columns: Vec<Scalar>) -> Self {
        Self { columns }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw column value.
    pub fn get(&self, index: usize) -> Result<&Scalar, ScanError> {
        self.columns.get(index).ok_or(ScanError::MissingColumn {
            index,
            len: self.columns.len(),
        })
    }

    /// Read a column as nullable text. Numbers are rendered in decimal form.
    pub fn text(&self, index: usize) -> Result<Option<String>, ScanError> {
        Ok(match self.get(index)? {
            Scalar::Null => None,
            Scalar::Int(v) => Some(v.to_string()),
            Scalar::Float(v) => Some(v.to_string()),
            Scalar::Text(v) => Some(v.clone()),
        })
    }

    /// Read a column as a nullable float. Numeric text is parsed.
    pub fn float(&self, index: usize) -> Result<Option<f64>, ScanError> {
        match self.get(index)? {
            Scalar::Null => Ok(None),
            Scalar::Int(v) => Ok(Some(*v as f64)),
            Scalar::Float(v) => Ok(Some(*v)),
            Scalar::Text(v) => v
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| mismatch(index, "float", &self.columns[index])),
        }
    }

    /// Read a column as a nullable integer. Integral floats and numeric text are accepted.
    pub fn int(&self, index: usize) -> Result<Option<i64>, ScanError> {
        match self.get(index)? {
            Scalar::Null => Ok(None),
            Scalar::Int(v) => Ok(Some(*v)),
            Scalar::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(Some(*v as i64)),
            Scalar::Float(_) => Err(mismatch(index, "int", &self.columns[index])),
            Scalar::Text(v) => v
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| mismatch(index, "int", &self.columns[index])),
        }
    }
}

impl From<Vec<Scalar>> for Row {
    fn from(columns: Vec<Scalar>) -> Self {
        Self::new(columns)
    }
}

fn mismatch(index: usize, expected: &'static str, found: &Scalar) -> ScanError {
    ScanError::TypeMismatch {
        index,
        expected,
        found: found.describe(),
    }
}

/// Build a [`Row`] from a list of values convertible into [`Scalar`].
///
/// ```
/// use dmprobe::row;
///
/// let r = row!["MAIN", 128.0, None::<f64>];
/// assert_eq!(r.len(), 3);
/// ```
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::storage::Row::new(vec![$($crate::storage::Scalar::from($value)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_accessor() {
        let r = crate::row!["SYSTEM", 7_i64, 1.5, None::<String>];
        assert_eq!(r.text(0).unwrap(), Some("SYSTEM".to_string()));
        assert_eq!(r.text(1).unwrap(), Some("7".to_string()));
        assert_eq!(r.text(2).unwrap(), Some("1.5".to_string()));
        assert_eq!(r.text(3).unwrap(), None);
    }

    #[test]
    fn test_float_accessor_parses_numeric_text() {
        let r = crate::row![" 42.5 ", 3_i64];
        assert_eq!(r.float(0).unwrap(), Some(42.5));
        assert_eq!(r.float(1).unwrap(), Some(3.0));
    }

    #[test]
    fn test_float_accessor_rejects_garbage() {
        let r = crate::row!["abc"];
        let err = r.float(0).unwrap_err();
        assert!(matches!(err, ScanError::TypeMismatch { index: 0, .. }));
    }

    #[test]
    fn test_int_accessor() {
        let r = crate::row![12.0, 12.5, "9"];
        assert_eq!(r.int(0).unwrap(), Some(12));
        assert!(r.int(1).is_err());
        assert_eq!(r.int(2).unwrap(), Some(9));
    }

    #[test]
    fn test_missing_column() {
        let r = crate::row!["only"];
        assert_eq!(
            r.text(3).unwrap_err(),
            ScanError::MissingColumn { index: 3, len: 1 }
        );
    }
}
