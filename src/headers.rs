//! Folding of repeated header lines.
//!
//! Per RFC 2616, section 4.2 it is acceptable to join multiple instances of
//! the same header with `", "` if the header supports a list of values. If not,
//! the first instance wins and later ones are dropped. `set-cookie` can not be
//! joined (cookie values contain commas) and is kept as a list. Extension
//! headers (`x-*`) are always joined.
//!
//! ```
//! use h1_mux::headers::{merge, FieldValue};
//!
//! let v = merge("x-forwarded-for", "a", None);
//! let v = merge("x-forwarded-for", "b", Some(v));
//! assert_eq!(v, FieldValue::Single("a, b".into()));
//!
//! let v = merge("host", "one", None);
//! let v = merge("host", "two", Some(v));
//! assert_eq!(v, FieldValue::Single("one".into()));
//! ```

use std::fmt;

/// How repeated occurrences of a field are folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Every occurrence appended to an ordered list (`set-cookie`).
    List,
    /// Occurrences joined with `", "`.
    Joined,
    /// First occurrence wins, later duplicates are dropped.
    FirstWins,
}

impl FieldClass {
    /// Classify a lower-cased field name.
    pub fn of(field: &str) -> FieldClass {
        match field {
            "set-cookie" => FieldClass::List,
            "accept" | "accept-charset" | "accept-encoding" | "accept-language"
            | "connection" | "cookie" => FieldClass::Joined,
            _ if field.starts_with("x-") => FieldClass::Joined,
            _ => FieldClass::FirstWins,
        }
    }
}

/// Value of a received header field after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A scalar value, possibly several occurrences joined.
    Single(String),
    /// Ordered occurrences of a field that can not be joined.
    List(Vec<String>),
}

impl FieldValue {
    /// The value as one string. Lists are joined with `", "`.
    pub fn joined(&self) -> String {
        match self {
            FieldValue::Single(v) => v.clone(),
            FieldValue::List(v) => v.join(", "),
        }
    }

    /// The first occurrence.
    pub fn first(&self) -> &str {
        match self {
            FieldValue::Single(v) => v,
            FieldValue::List(v) => v.first().map(|s| s.as_str()).unwrap_or(""),
        }
    }

    /// Iterate the individual values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let (single, list) = match self {
            FieldValue::Single(v) => (Some(v.as_str()), &[][..]),
            FieldValue::List(v) => (None, &v[..]),
        };
        single.into_iter().chain(list.iter().map(|s| s.as_str()))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined())
    }
}

/// Merge one occurrence of `field` into what was already received.
///
/// `field` must be lower-cased. The outcome depends only on the field name and
/// the order of arrival.
pub fn merge(field: &str, value: &str, existing: Option<FieldValue>) -> FieldValue {
    match (FieldClass::of(field), existing) {
        (FieldClass::List, None) => FieldValue::List(vec![value.to_string()]),
        (FieldClass::List, Some(FieldValue::List(mut v))) => {
            v.push(value.to_string());
            FieldValue::List(v)
        }
        (FieldClass::List, Some(FieldValue::Single(s))) => {
            FieldValue::List(vec![s, value.to_string()])
        }

        (FieldClass::Joined, None) => FieldValue::Single(value.to_string()),
        (FieldClass::Joined, Some(prev)) => {
            let mut s = prev.joined();
            s.push_str(", ");
            s.push_str(value);
            FieldValue::Single(s)
        }

        (FieldClass::FirstWins, None) => FieldValue::Single(value.to_string()),
        (FieldClass::FirstWins, Some(prev)) => prev,
    }
}

/// Received header fields, in order of first arrival.
///
/// Names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, FieldValue)>,
}

impl Headers {
    /// Empty header set.
    pub fn new() -> Self {
        Headers::default()
    }

    /// Merge one received occurrence. The name is lower-cased first.
    pub fn add(&mut self, field: &str, value: &str) {
        let field = field.to_ascii_lowercase();
        match self.fields.iter().position(|(k, _)| *k == field) {
            Some(idx) => {
                let (_, prev) = self.fields.remove(idx);
                let merged = merge(&field, value, Some(prev));
                self.fields.insert(idx, (field, merged));
            }
            None => {
                let merged = merge(&field, value, None);
                self.fields.push((field, merged));
            }
        }
    }

    /// Look up a field, case insensitively.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    /// Look up a field as a single string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).map(|v| v.first())
    }

    /// Whether `field` is present.
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Iterate `(name, value)` in order of first arrival.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
