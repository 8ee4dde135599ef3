//! Typed segmentation values.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A list element. Lists hold primitives only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A single segmentation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Primitive>),
}

macro_rules! impl_from {
    ($target:ident) => {
        impl From<bool> for $target {
            fn from(v: bool) -> Self {
                Self::Bool(v)
            }
        }

        impl From<i32> for $target {
            fn from(v: i32) -> Self {
                Self::Int(v.into())
            }
        }

        impl From<i64> for $target {
            fn from(v: i64) -> Self {
                Self::Int(v)
            }
        }

        impl From<f64> for $target {
            fn from(v: f64) -> Self {
                Self::Float(v)
            }
        }

        impl From<&str> for $target {
            fn from(v: &str) -> Self {
                Self::Text(v.to_string())
            }
        }

        impl From<String> for $target {
            fn from(v: String) -> Self {
                Self::Text(v)
            }
        }
    };
}

impl_from!(Primitive);
impl_from!(SegmentValue);

impl<T: Into<Primitive>> From<Vec<T>> for SegmentValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl Primitive {
    /// JSON has no NaN or infinity.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            _ => true,
        }
    }
}

impl SegmentValue {
    /// Parse a CLI-style literal: bools, integers, finite floats, else text.
    pub fn parse_literal(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            Self::Bool(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            Self::Int(i)
        } else if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
            Self::Float(f)
        } else {
            Self::Text(raw.to_string())
        }
    }

    /// Whether the value survives a JSON round trip unchanged.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            Self::List(items) => items.iter().all(Primitive::is_finite),
            _ => true,
        }
    }
}

/// Insertion-ordered string to value mapping.
///
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    entries: Vec<(String, SegmentValue)>,
}

impl Segmentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SegmentValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SegmentValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SegmentValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<SegmentValue> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SegmentValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<SegmentValue>> FromIterator<(K, V)> for Segmentation {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut segmentation = Self::new();
        for (k, v) in iter {
            segmentation.insert(k, v);
        }
        segmentation
    }
}

impl Serialize for Segmentation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Segmentation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SegmentationVisitor;

        impl<'de> Visitor<'de> for SegmentationVisitor {
            type Value = Segmentation;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of segmentation values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut segmentation = Segmentation::new();
                while let Some((k, v)) = access.next_entry::<String, SegmentValue>()? {
                    segmentation.insert(k, v);
                }
                Ok(segmentation)
            }
        }

        deserializer.deserialize_map(SegmentationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_in_insertion_order() {
        let segmentation = Segmentation::new()
            .with("zeta", 1)
            .with("alpha", "a")
            .with("mid", true);
        assert_eq!(
            serde_json::to_string(&segmentation).unwrap(),
            r#"{"zeta":1,"alpha":"a","mid":true}"#
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut segmentation = Segmentation::new().with("a", 1).with("b", 2);
        segmentation.insert("a", 3);
        assert_eq!(segmentation.len(), 2);
        assert_eq!(
            serde_json::to_string(&segmentation).unwrap(),
            r#"{"a":3,"b":2}"#
        );
    }

    #[test]
    fn test_value_kinds_survive_json() {
        let segmentation = Segmentation::new()
            .with("flag", false)
            .with("n", 7)
            .with("ratio", 0.5)
            .with("tags", vec!["x", "y"]);
        let json = serde_json::to_string(&segmentation).unwrap();
        let back: Segmentation = serde_json::from_str(&json).unwrap();

        assert_eq!(back.get("flag"), Some(&SegmentValue::Bool(false)));
        assert_eq!(back.get("n"), Some(&SegmentValue::Int(7)));
        assert_eq!(back.get("ratio"), Some(&SegmentValue::Float(0.5)));
        assert_eq!(
            back.get("tags"),
            Some(&SegmentValue::List(vec!["x".into(), "y".into()]))
        );
        assert_eq!(
            SegmentValue::from(vec![1.5, 2.0]),
            SegmentValue::List(vec![Primitive::Float(1.5), Primitive::Float(2.0)])
        );
        let keys: Vec<&str> = back.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["flag", "n", "ratio", "tags"]);
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(SegmentValue::parse_literal("true"), SegmentValue::Bool(true));
        assert_eq!(SegmentValue::parse_literal("12"), SegmentValue::Int(12));
        assert_eq!(SegmentValue::parse_literal("1.5"), SegmentValue::Float(1.5));
        assert_eq!(
            SegmentValue::parse_literal("home"),
            SegmentValue::Text("home".to_string())
        );
        for raw in ["NaN", "inf", "-infinity"] {
            assert_eq!(
                SegmentValue::parse_literal(raw),
                SegmentValue::Text(raw.to_string())
            );
        }
    }

    #[test]
    fn test_nested_list_is_not_readable() {
        assert!(serde_json::from_str::<SegmentValue>("[[1], 2]").is_err());
        assert!(serde_json::from_str::<SegmentValue>("[1, \"a\", true]").is_ok());
    }

    #[test]
    fn test_non_finite_values() {
        assert!(!SegmentValue::Float(f64::NAN).is_finite());
        assert!(!SegmentValue::from(vec![1.0, f64::INFINITY]).is_finite());
        assert!(SegmentValue::from(vec![1.0, 2.0]).is_finite());
        assert!(SegmentValue::Text("NaN".to_string()).is_finite());
    }

    #[test]
    fn test_remove() {
        let mut segmentation = Segmentation::new().with("a", 1);
        assert_eq!(segmentation.remove("a"), Some(SegmentValue::Int(1)));
        assert!(segmentation.is_empty());
        assert_eq!(segmentation.remove("a"), None);
    }
}
