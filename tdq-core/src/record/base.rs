//! Base implementation of records for logging.
use crate::error::TdqError;
use std::collections::HashMap;

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically a loss or a norm.
    Scalar(f32),
}

/// Key-value pairs returned by a training step.
///
/// # Examples
///
/// ```rust
/// use tdq_core::record::{Record, RecordValue};
///
/// let record = Record::from_slice(&[
///     ("loss", RecordValue::Scalar(0.25)),
///     ("grad_norm", RecordValue::Scalar(12.0)),
/// ]);
/// assert_eq!(record.get_scalar("grad_norm").unwrap(), 12.0);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, TdqError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            None => Err(TdqError::RecordKeyError(k.to_string())),
        }
    }
}
