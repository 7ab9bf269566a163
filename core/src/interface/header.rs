//! Ordered keyword header attached to every image plane.

use serde::{Deserialize, Serialize};

use crate::prelude::{ReduceError, ReduceResult};

/// Typed header value. Non-finite floats serialize as `"NaN"` or
/// `"Infinity"` and read back as floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "super::non_finite::float")] f64),
    Str(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Str(s) => s.trim().parse().ok(),
            HeaderValue::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            HeaderValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            HeaderValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String form; numbers are formatted so IDs stored as integers still
    /// match table keys.
    pub fn as_string(&self) -> String {
        match self {
            HeaderValue::Str(s) => s.trim().to_string(),
            HeaderValue::Int(v) => v.to_string(),
            HeaderValue::Float(v) => v.to_string(),
            HeaderValue::Bool(v) => if *v { "T" } else { "F" }.to_string(),
        }
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Float(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        HeaderValue::Int(value as i64)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Bool(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Str(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Str(value)
    }
}

/// One keyword record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCard {
    pub key: String,
    pub value: HeaderValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Keyword header preserving insertion order. Keys are upper-cased.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    cards: Vec<HeaderCard>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[HeaderCard] {
        &self.cards
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        let key = key.to_ascii_uppercase();
        self.cards.iter().find(|card| card.key == key).map(|card| &card.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(HeaderValue::as_i64)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(HeaderValue::as_string)
    }

    pub fn require_f64(&self, key: &str) -> ReduceResult<f64> {
        self.get_f64(key)
            .ok_or_else(|| ReduceError::MissingKeyword(key.to_ascii_uppercase()))
    }

    pub fn require_string(&self, key: &str) -> ReduceResult<String> {
        self.get_string(key)
            .ok_or_else(|| ReduceError::MissingKeyword(key.to_ascii_uppercase()))
    }

    /// Insert or replace a keyword, keeping its original position on replace.
    pub fn set(&mut self, key: &str, value: impl Into<HeaderValue>) {
        self.set_with_comment(key, value, None);
    }

    pub fn set_with_comment(&mut self, key: &str, value: impl Into<HeaderValue>, comment: Option<&str>) {
        let key = key.to_ascii_uppercase();
        let value = value.into();
        let comment = comment.map(str::to_string);
        match self.cards.iter_mut().find(|card| card.key == key) {
            Some(card) => {
                card.value = value;
                if comment.is_some() {
                    card.comment = comment;
                }
            }
            None => self.cards.push(HeaderCard { key, value, comment }),
        }
    }

    /// Remove a keyword; returns whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let key = key.to_ascii_uppercase();
        let before = self.cards.len();
        self.cards.retain(|card| card.key != key);
        self.cards.len() != before
    }
}
