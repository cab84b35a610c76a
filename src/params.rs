//! Parameter trees sent to the gateway.
//!
//! A [`ParamTree`] is the request payload of a gateway command: a mapping from
//! string keys to [`ParamValue`]s, nested arbitrarily. Every mapping is a
//! [`BTreeMap`], so keys are always held in ascending byte-lexicographic order
//! at every level. That ordering *is* the canonical form: two trees with the
//! same content encode to byte-identical JSON regardless of the order the caller
//! inserted keys in.
//!
//! Lists keep their element order; mappings nested inside lists are ordered
//! like any other mapping.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use url::form_urlencoded;

use crate::json::{self, JsonDialect};

/// A single value in a [`ParamTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Whether the gateway treats this value as "not provided".
    ///
    /// Null, `false`, numeric zero, `""`, `"0"`, and empty lists or maps are blank.
    /// Defaults are only filled into blank fields.
    pub fn is_blank(&self) -> bool {
        match self {
            ParamValue::Null => true,
            ParamValue::Bool(b) => !b,
            ParamValue::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
            ParamValue::String(s) => s.is_empty() || s == "0",
            ParamValue::List(items) => items.is_empty(),
            ParamValue::Map(map) => map.is_empty(),
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<ParamValue>> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form used in form bodies. `None` means the field is omitted.
    fn form_scalar(&self) -> Option<String> {
        match self {
            ParamValue::Null => None,
            ParamValue::Bool(true) => Some("1".to_string()),
            ParamValue::Bool(false) => Some("0".to_string()),
            ParamValue::Number(n) => Some(n.to_string()),
            ParamValue::String(s) => Some(s.clone()),
            ParamValue::List(_) | ParamValue::Map(_) => None,
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => ParamValue::Number(n),
            Value::String(s) => ParamValue::String(s),
            Value::Array(items) => {
                ParamValue::List(items.into_iter().map(ParamValue::from).collect())
            }
            Value::Object(map) => ParamValue::Map(
                map.into_iter()
                    .map(|(key, value)| (key, ParamValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&ParamValue> for Value {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Number(n) => Value::Number(n.clone()),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            ParamValue::Map(map) => Value::Object(map_to_json(map)),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<ParamTree> for ParamValue {
    fn from(tree: ParamTree) -> Self {
        ParamValue::Map(tree.0)
    }
}

/// Iterates in key order, so the resulting JSON map (insertion-ordered) is sorted too.
fn map_to_json(map: &BTreeMap<String, ParamValue>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), Value::from(value)))
        .collect()
}

/// Canonicalizes an arbitrary JSON value into a [`ParamTree`].
///
/// Returns `None` when the top-level value is not a mapping; there is nothing to
/// order and nothing to sign. Repeated canonicalization is a no-op.
///
/// ```rust
/// use start2pay::params::canonicalize;
/// use serde_json::json;
///
/// let a = canonicalize(json!({"b": 1, "a": {"y": 2, "x": 3}})).unwrap();
/// let b = canonicalize(json!({"a": {"x": 3, "y": 2}, "b": 1})).unwrap();
/// assert_eq!(a.to_json(Default::default()), b.to_json(Default::default()));
/// assert!(canonicalize(json!([1, 2, 3])).is_none());
/// ```
pub fn canonicalize(value: Value) -> Option<ParamTree> {
    ParamTree::try_from(value).ok()
}

/// A canonical request payload. See the [module documentation](self).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamTree(BTreeMap<String, ParamValue>);

impl ParamTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<K: Into<String>, V: Into<ParamValue>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Sets `key` to `value` unless the current value is present and not blank.
    ///
    /// Returns `true` when the value was written.
    pub fn fill_if_blank<V: Into<ParamValue>>(&mut self, key: &str, value: V) -> bool {
        fill_if_blank(&mut self.0, key, value.into())
    }

    /// Canonical JSON text of the tree.
    pub fn to_json(&self, dialect: JsonDialect) -> String {
        json::encode_value(&Value::Object(map_to_json(&self.0)), dialect)
    }

    /// Encodes the tree as an `application/x-www-form-urlencoded` body.
    ///
    /// Nested mappings and lists flatten to bracketed keys (`a[b][0]=v`), booleans
    /// become `1`/`0`, and nulls are left out. Spaces encode as `+`.
    pub fn to_form_body(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.0 {
            append_form_pairs(&mut serializer, key.clone(), value);
        }
        serializer.finish()
    }

    pub fn into_inner(self) -> BTreeMap<String, ParamValue> {
        self.0
    }
}

impl Deref for ParamTree {
    type Target = BTreeMap<String, ParamValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ParamTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamTree {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ParamTree {
    type Error = Value;

    /// Fails with the original value when it is not a JSON object.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(
                map.into_iter()
                    .map(|(key, value)| (key, ParamValue::from(value)))
                    .collect(),
            )),
            other => Err(other),
        }
    }
}

pub(crate) fn fill_if_blank(
    map: &mut BTreeMap<String, ParamValue>,
    key: &str,
    value: ParamValue,
) -> bool {
    match map.get(key) {
        Some(current) if !current.is_blank() => false,
        _ => {
            map.insert(key.to_string(), value);
            true
        }
    }
}

fn append_form_pairs(
    serializer: &mut form_urlencoded::Serializer<'_, String>,
    key: String,
    value: &ParamValue,
) {
    match value {
        ParamValue::Map(map) => {
            for (child_key, child) in map {
                append_form_pairs(serializer, format!("{key}[{child_key}]"), child);
            }
        }
        ParamValue::List(items) => {
            for (index, child) in items.iter().enumerate() {
                append_form_pairs(serializer, format!("{key}[{index}]"), child);
            }
        }
        scalar => {
            if let Some(text) = scalar.form_scalar() {
                serializer.append_pair(&key, &text);
            }
        }
    }
}
