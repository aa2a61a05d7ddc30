//! Bound query parameters.

use crate::value::Value;
use std::collections::BTreeMap;

/// Parameters bound to a query's placeholders.
#[derive(Clone, Debug, PartialEq)]
pub enum Params {
    /// `?` placeholders, bound in order.
    Positional(Vec<Value>),
    /// Named placeholders.
    Named(BTreeMap<String, Value>),
}

impl Params {
    /// Creates positional parameters.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Creates named parameters.
    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the number of bound values.
    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    /// Returns true if no values are bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type-tagged JSON form, used in cache fingerprints. Two parameter sets
    /// render the same only if they bind equal values.
    pub fn to_tagged_json(&self) -> serde_json::Value {
        match self {
            Params::Positional(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_tagged_json).collect())
            }
            Params::Named(values) => serde_json::Value::Object(
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_tagged_json()))
                    .collect(),
            ),
        }
    }
}
