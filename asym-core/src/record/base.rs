//! Records of named values.
use crate::error::AsymError;
use chrono::prelude::{DateTime, Local};
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// A value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A floating-point value, e.g. a loss or a return.
    Scalar(f32),

    /// A timestamp.
    DateTime(DateTime<Local>),

    /// A vector of values, e.g. an action.
    Array1(Vec<f32>),

    /// A text value, e.g. a hyperparameter.
    String(String),
}

/// A set of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record with a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Iterates over the keys.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a value, replacing an existing one with the same key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Inserts a scalar.
    pub fn insert_scalar(&mut self, k: impl Into<String>, v: f32) {
        self.0.insert(k.into(), RecordValue::Scalar(v));
    }

    /// Iterates over the key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Consumes the record into an iterator.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Returns the value of the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges two records. Values of `record` win on duplicated keys.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges `record` into `self`. Values of `record` win on duplicated keys.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Returns the scalar of the given key.
    pub fn get_scalar(&self, k: &str) -> Result<f32, AsymError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(AsymError::RecordValueTypeError("Scalar".to_string())),
            None => Err(AsymError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the vector of the given key.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, AsymError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(AsymError::RecordValueTypeError("Array1".to_string())),
            None => Err(AsymError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the string of the given key.
    pub fn get_string(&self, k: &str) -> Result<String, AsymError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(AsymError::RecordValueTypeError("String".to_string())),
            None => Err(AsymError::RecordKeyError(k.to_string())),
        }
    }

    /// Keys of the scalar entries in sorted order.
    ///
    /// Collective reductions over records rely on every worker visiting the
    /// scalars in the same order.
    pub fn sorted_scalar_keys(&self) -> Vec<String> {
        let mut keys = self
            .0
            .iter()
            .filter(|(_, v)| matches!(v, RecordValue::Scalar(_)))
            .map(|(k, _)| k.clone())
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_typed_values() {
        let mut record = Record::from_scalar("loss", 0.5);
        record.insert("name", RecordValue::String("ddpg".into()));
        record.insert("act", RecordValue::Array1(vec![0.1, 0.2]));

        assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
        assert_eq!(record.get_string("name").unwrap(), "ddpg");
        assert_eq!(record.get_array1("act").unwrap(), vec![0.1, 0.2]);
        assert_eq!(
            record.get_scalar("name"),
            Err(AsymError::RecordValueTypeError("Scalar".into()))
        );
        assert_eq!(
            record.get_scalar("missing"),
            Err(AsymError::RecordKeyError("missing".into()))
        );
    }

    #[test]
    fn test_merge_overwrites() {
        let a = Record::from_slice(&[("x", RecordValue::Scalar(1.0)), ("y", RecordValue::Scalar(2.0))]);
        let b = Record::from_scalar("y", 3.0);
        let c = a.merge(b);
        assert_eq!(c.get_scalar("x").unwrap(), 1.0);
        assert_eq!(c.get_scalar("y").unwrap(), 3.0);
        assert_eq!(c.sorted_scalar_keys(), vec!["x".to_string(), "y".to_string()]);
    }
}
