//! Custom properties attached to map elements.

use std::collections::BTreeMap;

/// Typed custom property value as authored in Tiled.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `bool` property.
    Bool(bool),
    /// `int` property.
    Int(i64),
    /// `float` property.
    Float(f64),
    /// `string` property; also used for `file` and `color`.
    String(String),
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

/// Named property bag attached to maps, layers, objects, tilesets and tiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets `name`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.values.insert(name.into(), value.into())
    }

    /// Raw value of `name`.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// `true` if `name` is set, whatever its type.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// `true` without properties.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Properties sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bool value; `"true"`/`"false"` strings are accepted too.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            // "true" / "false" strings count as flags
            PropertyValue::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Int value.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Int value if it fits in `i32`.
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|v| i32::try_from(v).ok())
    }

    /// Float or int, widened.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// See [`Self::get_f64`].
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get_f64(name).map(|v| v as f32)
    }

    /// String value.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropertyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        Properties {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_do_not_coerce_across_kinds() {
        let p = Properties::new()
            .with("solid", true)
            .with("weight", 2.5)
            .with("cost", 3)
            .with("big_id", 5_000_000_000i64)
            .with("name", "lava");

        assert_eq!(p.get_bool("solid"), Some(true));
        assert_eq!(p.get_f32("weight"), Some(2.5));
        assert_eq!(p.get_f64("cost"), Some(3.0));
        assert_eq!(p.get_i32("cost"), Some(3));
        assert_eq!(p.get_i64("big_id"), Some(5_000_000_000));
        assert_eq!(p.get_i32("big_id"), None);
        assert_eq!(p.get_string("name"), Some("lava"));
        assert_eq!(p.get_bool("name"), None);
        assert_eq!(p.get_string("missing"), None);
    }

    #[test]
    fn string_flags_read_as_bools() {
        let p = Properties::new().with("walkable", "true");
        assert_eq!(p.get_bool("walkable"), Some(true));
    }
}
