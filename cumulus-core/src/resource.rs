//! Resource - Declared resources and their attribute values

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId {
    /// Resource type (e.g., "vpc", "instance")
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name, unique within its type
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Parse from the `type.name` form used in resolved-attribute documents
    pub fn parse(s: &str) -> Option<Self> {
        let (resource_type, name) = s.split_once('.')?;
        if resource_type.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(resource_type, name))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Reference to an attribute of another declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub target: ResourceId,
    /// Attribute being referenced (e.g., "id", "public_ip")
    pub attribute: String,
}

impl Reference {
    pub fn new(target: ResourceId, attribute: impl Into<String>) -> Self {
        Self {
            target,
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to another resource's attribute, resolved by the provisioning engine
    ResourceRef(Reference),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build a map value from key/value pairs
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::ResourceRef(r) => Some(r),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(r) => format!("ResourceRef({})", r),
        }
    }

    /// Visit every reference contained in this value, descending into lists and maps.
    /// The callback receives the attribute key the reference was found under.
    pub fn walk_references<'a>(
        &'a self,
        used_in: &'a str,
        f: &mut impl FnMut(&'a str, &'a Reference),
    ) {
        match self {
            Value::ResourceRef(r) => f(used_in, r),
            Value::List(items) => {
                for item in items {
                    item.walk_references(used_in, f);
                }
            }
            Value::Map(map) => {
                for (k, v) in map {
                    v.walk_references(k, f);
                }
            }
            _ => {}
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::ResourceRef(r)
    }
}

// References serialize as `{"$ref": "type.name.attribute"}` so the engine can
// tell them apart from literal maps.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::ResourceRef(r) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("$ref", &r.to_string())?;
                m.end()
            }
        }
    }
}

/// Desired state of a single resource, as declared
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: BTreeMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the `Name` tag
    pub fn with_name_tag(self, label: impl Into<String>) -> Self {
        self.with_attribute("tags", Value::map([("Name", Value::String(label.into()))]))
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// All references held by this resource, paired with the attribute key they appear under
    pub fn references(&self) -> Vec<(&str, &Reference)> {
        let mut refs = Vec::new();
        for (key, value) in &self.attributes {
            value.walk_references(key, &mut |used_in, r| refs.push((used_in, r)));
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_display_and_parse() {
        let id = ResourceId::new("vpc", "my-vpc");
        assert_eq!(id.to_string(), "vpc.my-vpc");
        assert_eq!(ResourceId::parse("vpc.my-vpc"), Some(id));
        assert_eq!(ResourceId::parse("vpc"), None);
        assert_eq!(ResourceId::parse(".my-vpc"), None);
    }

    #[test]
    fn references_are_found_in_nested_values() {
        let vpc = ResourceId::new("vpc", "main");
        let igw = ResourceId::new("internet_gateway", "igw");
        let rt = Resource::new("route_table", "rt")
            .with_attribute("vpc_id", Reference::new(vpc.clone(), "id"))
            .with_attribute(
                "routes",
                Value::List(vec![Value::map([
                    ("cidr_block", Value::from("0.0.0.0/0")),
                    ("gateway_id", Reference::new(igw.clone(), "id").into()),
                ])]),
            );

        let refs = rt.references();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().any(|(k, r)| *k == "vpc_id" && r.target == vpc));
        assert!(refs.iter().any(|(k, r)| *k == "gateway_id" && r.target == igw));
    }

    #[test]
    fn reference_serializes_as_ref_marker() {
        let value = Value::ResourceRef(Reference::new(ResourceId::new("vpc", "main"), "id"));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"$ref": "vpc.main.id"}));
    }

    #[test]
    fn name_tag_is_a_map() {
        let r = Resource::new("vpc", "main").with_name_tag("main");
        let tags = r.attribute("tags").and_then(Value::as_map).unwrap();
        assert_eq!(tags.get("Name"), Some(&Value::from("main")));
    }
}
