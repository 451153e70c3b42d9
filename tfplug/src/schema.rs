//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining resource and data source
//! schemas, including attribute types, builders, and config validation.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::Validator;
use std::collections::HashMap;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

/// Schema is returned by providers/resources/data sources
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block, // Root block containing all attributes
}

impl Schema {
    /// Walks a config value against this schema, reporting every problem
    /// rather than stopping at the first: missing required attributes and
    /// per-attribute validator failures all land in the returned list.
    pub fn validate_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for attr in &self.block.attributes {
            let path = AttributePath::new(&attr.name);

            let value = match &config.value {
                Dynamic::Map(m) => m.get(&attr.name),
                // Null config happens when a block is entirely absent
                Dynamic::Null => None,
                _ => None,
            };

            match value {
                None | Some(Dynamic::Null) => {
                    if attr.required {
                        diagnostics.push(
                            Diagnostic::error(
                                "Missing required attribute",
                                format!("The attribute '{}' is required", attr.name),
                            )
                            .with_attribute(path),
                        );
                    }
                }
                Some(Dynamic::Unknown) => {
                    // Unknown values are validated once known, after apply starts
                }
                Some(value) => {
                    for validator in &attr.validators {
                        validator.validate(value, &attr.name, &mut diagnostics);
                    }
                }
            }
        }

        diagnostics
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub force_new: bool,
    pub validators: Vec<Box<dyn Validator>>,
    pub deprecated: bool,
}

// Manual Debug implementation since validators don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("description", &self.description)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("force_new", &self.force_new)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field("deprecated", &self.deprecated)
            .finish()
    }
}

// Manual Clone implementation; validators are not clonable and schemas
// are rebuilt rather than shared, so clones drop them
impl Clone for Attribute {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            r#type: self.r#type.clone(),
            description: self.description.clone(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            force_new: self.force_new,
            validators: vec![],
            deprecated: self.deprecated,
        }
    }
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    /// Create a new attribute builder
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                force_new: false,
                validators: Vec::new(),
                deprecated: false,
            },
        }
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    /// Mark as computed
    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    /// Mark as requiring replacement when changed
    pub fn force_new(mut self) -> Self {
        self.attribute.force_new = true;
        self
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    /// Add validator
    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    /// Finalize the attribute
    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
/// ALWAYS use this for consistency
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    description_kind: StringKind::Plain,
                    deprecated: false,
                },
            },
        }
    }

    /// Set schema version
    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    /// Add attribute
    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    /// Set description kind
    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    /// Finalize the schema
    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::NumberRangeValidator;
    use crate::types::AttributePath;

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn schema_builder_creates_schema_with_attributes() {
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Test resource schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .build();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.attributes.len(), 2);
        assert_eq!(schema.block.description, "Test resource schema");
    }

    #[test]
    fn validate_config_reports_all_missing_required() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("account", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("key_id", AttributeType::String)
                    .required()
                    .build(),
            )
            .build();

        let config = DynamicValue::empty_object();
        let diags = schema.validate_config(&config);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn validate_config_runs_attribute_validators() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("vlan_id", AttributeType::Number)
                    .required()
                    .validator(Box::new(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(4095.0),
                    }))
                    .build(),
            )
            .build();

        let mut config = DynamicValue::empty_object();
        config
            .set_number(&AttributePath::new("vlan_id"), 4096.0)
            .unwrap();
        let diags = schema.validate_config(&config);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn validate_config_skips_unknown_values() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("vlan_id", AttributeType::Number)
                    .required()
                    .validator(Box::new(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(4095.0),
                    }))
                    .build(),
            )
            .build();

        let mut config = DynamicValue::empty_object();
        config.mark_unknown(&AttributePath::new("vlan_id")).unwrap();
        let diags = schema.validate_config(&config);
        assert!(diags.is_empty());
    }
}
