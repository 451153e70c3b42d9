//! Core type system for tfplug
//!
//! This module provides the core types used throughout the framework,
//! including Dynamic values, type definitions, and utility types.

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dynamic represents Terraform values that can be of any type
/// This is the core type for all configuration and state data
/// IMPORTANT: Always use type-safe accessors instead of matching directly
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (all numbers are f64 to match Terraform)
    Number(f64),
    /// String value
    String(String),
    /// List of values (ordered, allows duplicates)
    List(Vec<Dynamic>),
    /// Map of string keys to values (objects are represented as Maps)
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_str("__unknown__"),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid Dynamic value")
            }

            fn visit_unit<E>(self) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Null)
            }

            fn visit_bool<E>(self, value: bool) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                if value == "__unknown__" {
                    Ok(Dynamic::Unknown)
                } else {
                    Ok(Dynamic::String(value.to_string()))
                }
            }

            fn visit_string<E>(self, value: String) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                if value == "__unknown__" {
                    Ok(Dynamic::Unknown)
                } else {
                    Ok(Dynamic::String(value))
                }
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut hashmap = HashMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    hashmap.insert(key, value);
                }
                Ok(Dynamic::Map(hashmap))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// DynamicValue wraps Dynamic and provides encoding/decoding capabilities
/// This is what gets passed between Terraform and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    /// An empty object, the usual starting point when building state
    pub fn empty_object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    /// Encoding/decoding for wire protocol - Terraform uses msgpack by default
    pub fn encode_msgpack(&self) -> Result<Vec<u8>> {
        match &self.value {
            Dynamic::Null => Ok(vec![]),
            Dynamic::Map(map) => rmp_serde::encode::to_vec(map)
                .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e))),
            _ => rmp_serde::encode::to_vec(&self.value)
                .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e))),
        }
    }

    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }

        // Try to decode as a map first (most common case from Terraform)
        match rmp_serde::decode::from_slice::<HashMap<String, Dynamic>>(data) {
            Ok(map) => Ok(Self {
                value: Dynamic::Map(map),
            }),
            Err(_) => {
                // Fall back to decoding as a Dynamic value directly
                match rmp_serde::decode::from_slice::<Dynamic>(data) {
                    Ok(value) => Ok(Self { value }),
                    Err(_) => {
                        // Try decoding as Option<HashMap> for null values
                        match rmp_serde::decode::from_slice::<Option<HashMap<String, Dynamic>>>(
                            data,
                        ) {
                            Ok(None) => Ok(Self::null()),
                            Ok(Some(map)) => Ok(Self {
                                value: Dynamic::Map(map),
                            }),
                            Err(e) => Err(TfplugError::DecodingError(format!(
                                "msgpack decoding failed: {}",
                                e
                            ))),
                        }
                    }
                }
            }
        }
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value)
            .map_err(|e| TfplugError::EncodingError(format!("json encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self { value })
    }

    /// Type-safe accessors - ALWAYS use these instead of pattern matching
    /// These handle path navigation and type checking
    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "string".to_string(),
                actual: self.type_name(value),
            }),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Number(n) => Ok(*n),
            _ => Err(TfplugError::TypeMismatch {
                expected: "number".to_string(),
                actual: self.type_name(value),
            }),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Bool(b) => Ok(*b),
            _ => Err(TfplugError::TypeMismatch {
                expected: "bool".to_string(),
                actual: self.type_name(value),
            }),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::List(l) => Ok(l.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "list".to_string(),
                actual: self.type_name(value),
            }),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Map(m) => Ok(m.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "map".to_string(),
                actual: self.type_name(value),
            }),
        }
    }

    /// Optional accessors - absent, null and unknown attributes become None.
    /// Resources use these for optional config, where "not set" is routine
    /// and only a type mismatch is a real error.
    pub fn get_string_opt(&self, path: &AttributePath) -> Result<Option<String>> {
        match self.navigate_path(path) {
            Ok(Dynamic::String(s)) => Ok(Some(s.clone())),
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) | Err(_) => Ok(None),
            Ok(other) => Err(TfplugError::TypeMismatch {
                expected: "string".to_string(),
                actual: self.type_name(other),
            }),
        }
    }

    pub fn get_number_opt(&self, path: &AttributePath) -> Result<Option<f64>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Number(n)) => Ok(Some(*n)),
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) | Err(_) => Ok(None),
            Ok(other) => Err(TfplugError::TypeMismatch {
                expected: "number".to_string(),
                actual: self.type_name(other),
            }),
        }
    }

    pub fn get_bool_opt(&self, path: &AttributePath) -> Result<Option<bool>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Bool(b)) => Ok(Some(*b)),
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) | Err(_) => Ok(None),
            Ok(other) => Err(TfplugError::TypeMismatch {
                expected: "bool".to_string(),
                actual: self.type_name(other),
            }),
        }
    }

    pub fn get_list_opt(&self, path: &AttributePath) -> Result<Option<Vec<Dynamic>>> {
        match self.navigate_path(path) {
            Ok(Dynamic::List(l)) => Ok(Some(l.clone())),
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) | Err(_) => Ok(None),
            Ok(other) => Err(TfplugError::TypeMismatch {
                expected: "list".to_string(),
                actual: self.type_name(other),
            }),
        }
    }

    pub fn get_map_opt(&self, path: &AttributePath) -> Result<Option<HashMap<String, Dynamic>>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Map(m)) => Ok(Some(m.clone())),
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) | Err(_) => Ok(None),
            Ok(other) => Err(TfplugError::TypeMismatch {
                expected: "map".to_string(),
                actual: self.type_name(other),
            }),
        }
    }

    /// Type-safe setters - Use for building state/config objects
    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    /// Helpers for handling unknown values during planning
    pub fn is_null(&self) -> bool {
        matches!(self.value, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.value, Dynamic::Unknown)
    }

    /// Mark computed values as unknown during planning
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    // Private helper methods
    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name)) => {
                    m.get(name).ok_or_else(|| {
                        TfplugError::Custom(format!("attribute '{}' not found", name))
                    })?
                }
                (Dynamic::Map(m), AttributePathStep::ElementKeyString(key)) => {
                    m.get(key).ok_or_else(|| {
                        TfplugError::Custom(format!("map key '{}' not found", key))
                    })?
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = *idx as usize;
                    l.get(idx).ok_or_else(|| {
                        TfplugError::Custom(format!("list index {} out of bounds", idx))
                    })?
                }
                _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
            };
        }

        Ok(current)
    }

    fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        if path.steps.is_empty() {
            self.value = new_value;
            return Ok(());
        }

        // For non-empty paths, ensure we have a map at the root
        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        let last_idx = path.steps.len() - 1;

        for (idx, step) in path.steps.iter().enumerate() {
            if idx == last_idx {
                // Set the final value
                match (current, step) {
                    (Dynamic::Map(m), AttributePathStep::AttributeName(name)) => {
                        m.insert(name.clone(), new_value);
                        return Ok(());
                    }
                    (Dynamic::Map(m), AttributePathStep::ElementKeyString(key)) => {
                        m.insert(key.clone(), new_value);
                        return Ok(());
                    }
                    (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                        let idx = *idx as usize;
                        if idx < l.len() {
                            l[idx] = new_value;
                            return Ok(());
                        }
                        return Err(TfplugError::Custom(format!(
                            "list index {} out of bounds",
                            idx
                        )));
                    }
                    _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
                }
            } else {
                // Navigate to the next level
                current = match (current, step) {
                    (Dynamic::Map(m), AttributePathStep::AttributeName(name)) => {
                        m.entry(name.clone()).or_insert_with(|| {
                            // Determine what to insert based on next step
                            if let Some(next_step) = path.steps.get(idx + 1) {
                                match next_step {
                                    AttributePathStep::AttributeName(_) => {
                                        Dynamic::Map(HashMap::new())
                                    }
                                    AttributePathStep::ElementKeyInt(_) => {
                                        Dynamic::List(Vec::new())
                                    }
                                    AttributePathStep::ElementKeyString(_) => {
                                        Dynamic::Map(HashMap::new())
                                    }
                                }
                            } else {
                                Dynamic::Null
                            }
                        })
                    }
                    (Dynamic::Map(m), AttributePathStep::ElementKeyString(key)) => {
                        m.entry(key.clone())
                            .or_insert_with(|| Dynamic::Map(HashMap::new()))
                    }
                    (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                        let idx = *idx as usize;
                        if idx >= l.len() {
                            return Err(TfplugError::Custom(format!(
                                "list index {} out of bounds",
                                idx
                            )));
                        }
                        &mut l[idx]
                    }
                    _ => return Err(TfplugError::Custom("invalid path navigation".to_string())),
                };
            }
        }

        Err(TfplugError::Custom("failed to set value".to_string()))
    }

    fn type_name(&self, value: &Dynamic) -> String {
        match value {
            Dynamic::Null => "null".to_string(),
            Dynamic::Bool(_) => "bool".to_string(),
            Dynamic::Number(_) => "number".to_string(),
            Dynamic::String(_) => "string".to_string(),
            Dynamic::List(_) => "list".to_string(),
            Dynamic::Map(_) => "map".to_string(),
            Dynamic::Unknown => "unknown".to_string(),
        }
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object/map
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// Config represents configuration values
pub type Config = DynamicValue;

/// State represents resource state values
pub type State = DynamicValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_value_string_access() {
        let mut dv = DynamicValue::empty_object();
        dv.set_string(&AttributePath::new("name"), "test".to_string())
            .unwrap();

        let result = dv.get_string(&AttributePath::new("name")).unwrap();
        assert_eq!(result, "test");
    }

    #[test]
    fn dynamic_value_nested_access() {
        let mut dv = DynamicValue::empty_object();
        let path = AttributePath::new("config").attribute("endpoint");
        dv.set_string(&path, "https://example.com".to_string())
            .unwrap();

        let result = dv.get_string(&path).unwrap();
        assert_eq!(result, "https://example.com");
    }

    #[test]
    fn optional_accessor_treats_missing_as_none() {
        let dv = DynamicValue::empty_object();
        assert_eq!(dv.get_string_opt(&AttributePath::new("name")).unwrap(), None);
        assert_eq!(dv.get_number_opt(&AttributePath::new("size")).unwrap(), None);
    }

    #[test]
    fn optional_accessor_treats_null_as_none() {
        let mut dv = DynamicValue::empty_object();
        dv.set_null(&AttributePath::new("name")).unwrap();
        assert_eq!(dv.get_string_opt(&AttributePath::new("name")).unwrap(), None);
    }

    #[test]
    fn optional_accessor_rejects_wrong_type() {
        let mut dv = DynamicValue::empty_object();
        dv.set_number(&AttributePath::new("name"), 42.0).unwrap();
        assert!(dv.get_string_opt(&AttributePath::new("name")).is_err());
    }

    #[test]
    fn msgpack_round_trip_preserves_object() {
        let mut dv = DynamicValue::empty_object();
        dv.set_string(&AttributePath::new("id"), "abc".to_string())
            .unwrap();
        dv.set_number(&AttributePath::new("vlan_id"), 2.0).unwrap();

        let bytes = dv.encode_msgpack().unwrap();
        let decoded = DynamicValue::decode_msgpack(&bytes).unwrap();
        assert_eq!(decoded, dv);
    }

    #[test]
    fn msgpack_empty_payload_is_null() {
        let decoded = DynamicValue::decode_msgpack(&[]).unwrap();
        assert!(decoded.is_null());
    }
}
