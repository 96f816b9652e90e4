//! Schema - Define type schemas for resources
//!
//! Each resource type has a schema describing its attributes,
//! enabling type validation of a declaration set before hand-off.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::resource::{Resource, Value};

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Map with a fixed set of named fields (e.g., a route or an access rule)
    Struct {
        name: String,
        fields: Vec<AttributeSchema>,
    },
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            // References resolve to strings at provisioning time
            (AttributeType::String, Value::String(_) | Value::ResourceRef(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, .. }, Value::ResourceRef(_))
                if matches!(**base, AttributeType::String) =>
            {
                Ok(())
            }

            (AttributeType::Custom { validate, .. }, v) => {
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Struct { name, fields }, Value::Map(map)) => {
                validate_fields(fields, map).map_err(|errors| TypeError::FieldErrors {
                    name: name.clone(),
                    errors,
                })
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Struct { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be declared")]
    ComputedAttribute { name: String },

    #[error("Unknown resource type '{0}'")]
    UnknownResourceType(String),

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("{name}: {}", join_errors(errors))]
    FieldErrors { name: String, errors: Vec<TypeError> },
}

fn join_errors(errors: &[TypeError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Known only after provisioning (e.g., `id`, `public_ip`)
    pub computed: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Every resource exposes a computed `id` once provisioned
    pub fn with_computed_id(self) -> Self {
        self.attribute(
            AttributeSchema::new("id", AttributeType::String)
                .computed()
                .with_description("Provider-assigned identifier"),
        )
    }

    /// Whether `attribute` may be the target of a reference
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// Validate resource attributes, collecting every error
    pub fn validate(&self, attributes: &BTreeMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let fields: Vec<AttributeSchema> = self.attributes.values().cloned().collect();
        validate_fields(&fields, attributes)
    }
}

fn validate_fields(
    fields: &[AttributeSchema],
    attributes: &BTreeMap<String, Value>,
) -> Result<(), Vec<TypeError>> {
    let mut errors = Vec::new();

    // Check required attributes
    let mut required: Vec<&AttributeSchema> = fields.iter().filter(|f| f.required).collect();
    required.sort_by(|a, b| a.name.cmp(&b.name));
    for schema in required {
        if !attributes.contains_key(&schema.name) {
            errors.push(TypeError::MissingRequired {
                name: schema.name.clone(),
            });
        }
    }

    // Type check each attribute
    for (name, value) in attributes {
        match fields.iter().find(|f| &f.name == name) {
            Some(schema) if schema.computed => {
                errors.push(TypeError::ComputedAttribute { name: name.clone() });
            }
            Some(schema) => {
                if let Err(e) = schema.attr_type.validate(value) {
                    errors.push(TypeError::AttributeError {
                        name: name.clone(),
                        inner: Box::new(e),
                    });
                }
            }
            None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Schemas indexed by resource type
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ResourceSchema) {
        self.schemas.insert(schema.resource_type.clone(), schema);
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.schemas.get(resource_type)
    }

    /// Validate one resource against its schema
    pub fn validate_resource(&self, resource: &Resource) -> Result<(), Vec<TypeError>> {
        match self.get(&resource.id.resource_type) {
            Some(schema) => schema.validate(&resource.attributes),
            None => Err(vec![TypeError::UnknownResourceType(
                resource.id.resource_type.clone(),
            )]),
        }
    }
}

impl FromIterator<ResourceSchema> for SchemaRegistry {
    fn from_iter<I: IntoIterator<Item = ResourceSchema>>(iter: I) -> Self {
        let mut registry = Self::new();
        for schema in iter {
            registry.register(schema);
        }
        registry
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_cidr(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }

    /// Port number type, 0-65535
    pub fn port_number() -> AttributeType {
        AttributeType::Custom {
            name: "PortNumber".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if (0..=65535).contains(n) {
                        Ok(())
                    } else {
                        Err("Port number must be between 0 and 65535".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// Availability zone type (e.g., "ap-southeast-1a")
    pub fn availability_zone() -> AttributeType {
        AttributeType::Custom {
            name: "AvailabilityZone".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_availability_zone(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    }

    let ip = parts[0];
    let prefix = parts[1];

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

/// Validate an availability zone name: a region followed by a single zone letter
pub fn validate_availability_zone(zone: &str) -> Result<(), String> {
    let Some(letter) = zone.chars().last() else {
        return Err("Availability zone must not be empty".to_string());
    };
    let region = &zone[..zone.len() - letter.len_utf8()];
    let region_ok = region.split('-').count() >= 3
        && region.ends_with(|c: char| c.is_ascii_digit())
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if letter.is_ascii_lowercase() && region_ok {
        Ok(())
    } else {
        Err(format!(
            "Invalid availability zone '{}': expected a region followed by a zone letter",
            zone
        ))
    }
}

/// Region part of an availability zone name ("ap-southeast-1a" -> "ap-southeast-1")
pub fn region_of_zone(zone: &str) -> &str {
    let mut chars = zone.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(digit)) if letter.is_ascii_lowercase() && digit.is_ascii_digit() => {
            &zone[..zone.len() - 1]
        }
        _ => zone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["a".to_string(), "b".to_string()]);
        assert!(t.validate(&Value::String("a".to_string())).is_ok());
        assert!(t.validate(&Value::String("c".to_string())).is_err());
    }

    #[test]
    fn references_accepted_where_strings_are() {
        use crate::resource::{Reference, ResourceId};
        let r = Value::ResourceRef(Reference::new(ResourceId::new("vpc", "main"), "id"));
        assert!(AttributeType::String.validate(&r).is_ok());
        assert!(
            AttributeType::List(Box::new(AttributeType::String))
                .validate(&Value::List(vec![r.clone()]))
                .is_ok()
        );
        assert!(types::cidr().validate(&r).is_ok());
        assert!(types::port_number().validate(&r).is_err());
    }

    #[test]
    fn missing_required_and_unknown_attributes_are_all_reported() {
        let schema = ResourceSchema::new("vpc")
            .attribute(AttributeSchema::new("cidr_block", types::cidr()).required())
            .attribute(AttributeSchema::new("enable_dns_support", AttributeType::Bool));

        let mut attrs = BTreeMap::new();
        attrs.insert("bogus".to_string(), Value::Bool(true));
        attrs.insert("enable_dns_support".to_string(), Value::Int(1));

        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&TypeError::MissingRequired {
            name: "cidr_block".to_string()
        }));
        assert!(errors.contains(&TypeError::UnknownAttribute {
            name: "bogus".to_string()
        }));
    }

    #[test]
    fn computed_attribute_cannot_be_declared() {
        let schema = ResourceSchema::new("vpc").with_computed_id();
        let mut attrs = BTreeMap::new();
        attrs.insert("id".to_string(), Value::from("vpc-123"));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(
            errors,
            vec![TypeError::ComputedAttribute {
                name: "id".to_string()
            }]
        );
    }

    #[test]
    fn struct_type_checks_fields() {
        let t = AttributeType::Struct {
            name: "Route".to_string(),
            fields: vec![
                AttributeSchema::new("cidr_block", types::cidr()).required(),
                AttributeSchema::new("gateway_id", AttributeType::String),
            ],
        };
        assert!(
            t.validate(&Value::map([("cidr_block", Value::from("0.0.0.0/0"))]))
                .is_ok()
        );
        assert!(t.validate(&Value::map([("gateway_id", Value::from("igw"))])).is_err());
        assert!(t.validate(&Value::from("0.0.0.0/0")).is_err());
    }

    #[test]
    fn struct_reports_every_field_error() {
        let t = AttributeType::Struct {
            name: "Route".to_string(),
            fields: vec![
                AttributeSchema::new("cidr_block", types::cidr()).required(),
                AttributeSchema::new("gateway_id", AttributeType::String),
            ],
        };
        let err = t
            .validate(&Value::map([("gateway_id", Value::Int(1)), ("bogus", Value::Bool(true))]))
            .unwrap_err();

        let TypeError::FieldErrors { name, errors } = &err else {
            panic!("expected field errors, got {:?}", err);
        };
        assert_eq!(name, "Route");
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&TypeError::MissingRequired {
            name: "cidr_block".to_string()
        }));
        assert!(errors.contains(&TypeError::UnknownAttribute {
            name: "bogus".to_string()
        }));
        assert!(err.to_string().starts_with("Route: Required attribute 'cidr_block' is missing; "));
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();

        assert!(t.validate(&Value::String("10.0.0.0/16".to_string())).is_ok());
        assert!(t.validate(&Value::String("0.0.0.0/0".to_string())).is_ok());
        assert!(
            t.validate(&Value::String("255.255.255.255/32".to_string()))
                .is_ok()
        );

        assert!(t.validate(&Value::String("10.0.0.0".to_string())).is_err()); // no prefix
        assert!(t.validate(&Value::String("10.0.0.0/33".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.256/16".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0/16".to_string())).is_err());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_port_number_type() {
        let t = types::port_number();
        assert!(t.validate(&Value::Int(0)).is_ok());
        assert!(t.validate(&Value::Int(65535)).is_ok());
        assert!(t.validate(&Value::Int(65536)).is_err());
        assert!(t.validate(&Value::Int(-1)).is_err());
    }

    #[test]
    fn availability_zone_names() {
        assert!(validate_availability_zone("ap-southeast-1a").is_ok());
        assert!(validate_availability_zone("us-east-1f").is_ok());
        assert!(validate_availability_zone("ap-southeast-1").is_err());
        assert!(validate_availability_zone("apsoutheast1a").is_err());
        assert!(validate_availability_zone("").is_err());
        assert_eq!(region_of_zone("ap-southeast-1a"), "ap-southeast-1");
    }
}
