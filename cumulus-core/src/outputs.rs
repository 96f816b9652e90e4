//! Outputs - Resolve exports against attributes reported after provisioning
//!
//! The provisioning engine reports computed attributes as a JSON document keyed
//! by `type.name`:
//!
//! ```json
//! { "vpc.my-vpc": { "id": "vpc-0abc" }, "instance.instance-1": { "public_ip": "203.0.113.7" } }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::declaration::DeclarationSet;
use crate::resource::{Reference, ResourceId};

/// Error reading resolved attributes
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Invalid resolved attributes document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid resource key '{0}', expected type.name")]
    InvalidKey(String),

    #[error("Attributes for '{0}' must be an object")]
    NotAnObject(String),
}

/// Attribute values known after provisioning
#[derive(Debug, Clone, Default)]
pub struct ResolvedAttributes {
    attributes: HashMap<ResourceId, serde_json::Map<String, serde_json::Value>>,
}

impl ResolvedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, OutputError> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut resolved = Self::new();
        for (key, value) in document {
            let id = ResourceId::parse(&key).ok_or_else(|| OutputError::InvalidKey(key.clone()))?;
            match value {
                serde_json::Value::Object(attrs) => {
                    resolved.attributes.insert(id, attrs);
                }
                _ => return Err(OutputError::NotAnObject(key)),
            }
        }
        Ok(resolved)
    }

    pub fn insert(
        &mut self,
        id: ResourceId,
        attribute: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.attributes
            .entry(id)
            .or_default()
            .insert(attribute.into(), value);
    }

    pub fn get(&self, reference: &Reference) -> Option<&serde_json::Value> {
        self.attributes
            .get(&reference.target)?
            .get(&reference.attribute)
            .filter(|v| !v.is_null())
    }
}

/// Value of an export
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum OutputValue {
    Known(serde_json::Value),
    /// Not yet reported by the provisioning engine
    Pending,
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::Known(serde_json::Value::String(s)) => write!(f, "{}", s),
            OutputValue::Known(v) => write!(f, "{}", v),
            OutputValue::Pending => write!(f, "(known after apply)"),
        }
    }
}

/// A resolved export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub name: String,
    pub source: String,
    pub value: OutputValue,
}

/// Resolve every export of the set, in registration order
pub fn resolve(set: &DeclarationSet, resolved: &ResolvedAttributes) -> Vec<Output> {
    set.exports()
        .iter()
        .map(|export| {
            let reference = export.reference();
            let value = match resolved.get(&reference) {
                Some(v) => OutputValue::Known(v.clone()),
                None => OutputValue::Pending,
            };
            Output {
                name: export.name.clone(),
                source: reference.to_string(),
                value,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack::web_stack;

    #[test]
    fn unresolved_exports_are_pending() {
        let set = web_stack(&StackConfig::default()).unwrap();
        let outputs = resolve(&set, &ResolvedAttributes::new());

        assert_eq!(outputs.len(), 3);
        assert!(outputs.iter().all(|o| o.value == OutputValue::Pending));
        assert_eq!(outputs[1].source, "instance.instance-1.public_ip");
    }

    #[test]
    fn reported_attributes_resolve_exports() {
        let set = web_stack(&StackConfig::default()).unwrap();
        let resolved = ResolvedAttributes::from_json(
            r#"{
                "vpc.my-vpc": { "id": "vpc-0abc" },
                "instance.instance-1": { "public_ip": "203.0.113.7" },
                "instance.instance-2": { "public_ip": null }
            }"#,
        )
        .unwrap();

        let outputs = resolve(&set, &resolved);
        assert_eq!(outputs[0].value, OutputValue::Known("vpc-0abc".into()));
        assert_eq!(outputs[1].value.to_string(), "203.0.113.7");
        assert_eq!(outputs[2].value, OutputValue::Pending);
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(matches!(
            ResolvedAttributes::from_json(r#"{"vpc": {}}"#),
            Err(OutputError::InvalidKey(_))
        ));
        assert!(matches!(
            ResolvedAttributes::from_json(r#"{"vpc.main": "vpc-1"}"#),
            Err(OutputError::NotAnObject(_))
        ));
        assert!(matches!(
            ResolvedAttributes::from_json("not json"),
            Err(OutputError::Json(_))
        ));
    }

    #[test]
    fn pending_serializes_without_value() {
        let json = serde_json::to_value(OutputValue::Pending).unwrap();
        assert_eq!(json, serde_json::json!({"status": "pending"}));
    }

    #[test]
    fn insert_adds_attribute() {
        let mut resolved = ResolvedAttributes::new();
        let id = ResourceId::new("vpc", "main");
        resolved.insert(id.clone(), "id", "vpc-9".into());
        assert_eq!(
            resolved.get(&Reference::new(id, "id")),
            Some(&serde_json::Value::from("vpc-9"))
        );
    }
}
