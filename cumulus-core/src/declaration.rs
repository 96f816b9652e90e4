//! Declaration - Build a set of declared resources and named outputs
//!
//! A [`DeclarationSetBuilder`] collects resources one at a time, handing back a
//! [`Handle`] for each so later declarations can reference it. `build()` freezes
//! the result into an immutable [`DeclarationSet`] carrying an explicit
//! dependency graph.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use serde::Serialize;

use crate::access;
use crate::graph::{Dependency, DependencyGraph};
use crate::providers::ec2;
use crate::resource::{Reference, Resource, ResourceId, Value};
use crate::schema::{SchemaRegistry, TypeError};

/// Errors detected while declaring resources
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclarationError {
    #[error("Duplicate declaration: {0} is already declared")]
    DuplicateDeclaration(ResourceId),

    #[error("Duplicate export: '{0}' is already exported")]
    DuplicateExport(String),

    #[error("Dangling reference: {reference} used in {used_by} is not declared")]
    DanglingReference {
        reference: String,
        used_by: String,
    },
}

/// Opaque handle to a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    id: ResourceId,
}

impl Handle {
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Reference one of this resource's attributes. Use
    /// [`DeclarationSetBuilder::reference`] to also check the handle belongs
    /// to the builder.
    pub fn reference(&self, field: impl Into<String>) -> Value {
        Value::ResourceRef(Reference::new(self.id.clone(), field))
    }
}

/// Named output bound to a resource attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    pub name: String,
    pub resource: ResourceId,
    pub attribute: String,
}

impl Export {
    pub fn reference(&self) -> Reference {
        Reference::new(self.resource.clone(), self.attribute.clone())
    }
}

/// Builder collecting declarations in order
#[derive(Debug, Default)]
pub struct DeclarationSetBuilder {
    resources: Vec<Resource>,
    index: HashSet<ResourceId>,
    exports: Vec<Export>,
}

impl DeclarationSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource. Its name must be unique within its type, and every
    /// resource it references must already be declared.
    pub fn declare(&mut self, resource: Resource) -> Result<Handle, DeclarationError> {
        if self.index.contains(&resource.id) {
            return Err(DeclarationError::DuplicateDeclaration(resource.id));
        }

        for (used_in, reference) in resource.references() {
            if !self.index.contains(&reference.target) {
                return Err(DeclarationError::DanglingReference {
                    reference: reference.to_string(),
                    used_by: format!("{}.{}", resource.id, used_in),
                });
            }
        }

        debug!("declared {}", resource.id);
        let handle = Handle {
            id: resource.id.clone(),
        };
        self.index.insert(resource.id.clone());
        self.resources.push(resource);
        Ok(handle)
    }

    /// Reference an attribute of a declared resource
    pub fn reference(
        &self,
        handle: &Handle,
        field: impl Into<String>,
    ) -> Result<Value, DeclarationError> {
        let field = field.into();
        if !self.index.contains(&handle.id) {
            return Err(DeclarationError::DanglingReference {
                reference: format!("{}.{}", handle.id, field),
                used_by: "reference".to_string(),
            });
        }
        Ok(handle.reference(field))
    }

    /// Register a named output bound to a declared resource's attribute
    pub fn export(
        &mut self,
        name: impl Into<String>,
        handle: &Handle,
        field: impl Into<String>,
    ) -> Result<(), DeclarationError> {
        let name = name.into();
        let field = field.into();

        if self.exports.iter().any(|e| e.name == name) {
            return Err(DeclarationError::DuplicateExport(name));
        }
        if !self.index.contains(&handle.id) {
            return Err(DeclarationError::DanglingReference {
                reference: format!("{}.{}", handle.id, field),
                used_by: format!("export {}", name),
            });
        }

        debug!("exported {} = {}.{}", name, handle.id, field);
        self.exports.push(Export {
            name,
            resource: handle.id.clone(),
            attribute: field,
        });
        Ok(())
    }

    /// Freeze the declarations into an immutable set
    pub fn build(self) -> Result<DeclarationSet, DeclarationError> {
        for resource in &self.resources {
            for (used_in, reference) in resource.references() {
                if !self.index.contains(&reference.target) {
                    return Err(DeclarationError::DanglingReference {
                        reference: reference.to_string(),
                        used_by: format!("{}.{}", resource.id, used_in),
                    });
                }
            }
        }

        // References may only point backwards, so the graph is acyclic
        let graph = DependencyGraph::from_resources(&self.resources);
        debug_assert!(!graph.has_cycle());

        let positions = self
            .resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        Ok(DeclarationSet {
            resources: self.resources,
            positions,
            exports: self.exports,
            graph,
        })
    }
}

/// Immutable snapshot of a declaration phase, ready for hand-off
#[derive(Debug, Clone)]
pub struct DeclarationSet {
    resources: Vec<Resource>,
    positions: HashMap<ResourceId, usize>,
    exports: Vec<Export>,
    graph: DependencyGraph,
}

impl DeclarationSet {
    /// Resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.positions.get(id).map(|&i| &self.resources[i])
    }

    /// Exports in registration order
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn dependencies_of(&self, id: &ResourceId) -> &[Dependency] {
        self.graph.dependencies_of(id)
    }

    /// Resources of the given type, in declaration order
    pub fn of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .iter()
            .filter(move |r| r.id.resource_type == resource_type)
    }

    /// Deterministic creation order: dependencies first, ties by declaration order
    pub fn creation_order(&self) -> Vec<ResourceId> {
        let declared: Vec<ResourceId> = self.resources.iter().map(|r| r.id.clone()).collect();
        self.graph
            .topological_order(&declared)
            .unwrap_or(declared)
    }

    /// Whether both sets declare the same resources and exports, ignoring order
    pub fn is_equivalent(&self, other: &DeclarationSet) -> bool {
        let ours: BTreeMap<_, _> = self.resources.iter().map(|r| (&r.id, r)).collect();
        let theirs: BTreeMap<_, _> = other.resources.iter().map(|r| (&r.id, r)).collect();
        let our_exports: BTreeMap<_, _> = self.exports.iter().map(|e| (&e.name, e)).collect();
        let their_exports: BTreeMap<_, _> = other.exports.iter().map(|e| (&e.name, e)).collect();
        ours == theirs && our_exports == their_exports
    }

    /// Check every resource against its schema, collecting all errors.
    /// Security groups that pass their schema also have their rule port ranges checked.
    pub fn validate(&self, schemas: &SchemaRegistry) -> Result<(), Vec<(ResourceId, TypeError)>> {
        let mut errors = Vec::new();
        for resource in &self.resources {
            let found = match schemas.validate_resource(resource) {
                Err(errs) => errs,
                Ok(()) if resource.id.resource_type == ec2::SECURITY_GROUP => {
                    access::port_range_errors(resource)
                }
                Ok(()) => Vec::new(),
            };
            errors.extend(found.into_iter().map(|e| (resource.id.clone(), e)));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Serialize the set for the provisioning engine
    pub fn to_json(&self) -> serde_json::Value {
        let resources: Vec<serde_json::Value> = self
            .resources
            .iter()
            .map(|r| {
                let depends_on: Vec<String> = self
                    .graph
                    .targets_of(&r.id)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                serde_json::json!({
                    "type": r.id.resource_type,
                    "name": r.id.name,
                    "attributes": r.attributes,
                    "depends_on": depends_on,
                })
            })
            .collect();

        let mut exports = serde_json::Map::new();
        for export in &self.exports {
            exports.insert(
                export.name.clone(),
                serde_json::json!({ "$ref": export.reference().to_string() }),
            );
        }

        serde_json::json!({
            "resources": resources,
            "exports": exports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc() -> Resource {
        Resource::new("vpc", "main").with_attribute("cidr_block", "10.0.0.0/16")
    }

    #[test]
    fn declare_returns_usable_handle() {
        let mut builder = DeclarationSetBuilder::new();
        let vpc = builder.declare(vpc()).unwrap();
        let subnet = builder
            .declare(
                Resource::new("subnet", "public")
                    .with_attribute("vpc_id", vpc.reference("id")),
            )
            .unwrap();

        let set = builder.build().unwrap();
        assert_eq!(set.resources().len(), 2);
        let deps = set.dependencies_of(subnet.id());
        assert_eq!(deps.len(), 1);
        assert_eq!(&deps[0].target, vpc.id());
        assert_eq!(deps[0].used_in, "vpc_id");
    }

    #[test]
    fn duplicate_declaration_fails() {
        let mut builder = DeclarationSetBuilder::new();
        builder.declare(vpc()).unwrap();
        let err = builder.declare(vpc()).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::DuplicateDeclaration(ResourceId::new("vpc", "main"))
        );
    }

    #[test]
    fn same_name_in_different_types_is_allowed() {
        let mut builder = DeclarationSetBuilder::new();
        builder.declare(vpc()).unwrap();
        assert!(builder.declare(Resource::new("subnet", "main")).is_ok());
    }

    #[test]
    fn duplicate_export_fails() {
        let mut builder = DeclarationSetBuilder::new();
        let vpc = builder.declare(vpc()).unwrap();
        builder.export("vpcId", &vpc, "id").unwrap();
        let err = builder.export("vpcId", &vpc, "cidr_block").unwrap_err();
        assert_eq!(err, DeclarationError::DuplicateExport("vpcId".to_string()));
    }

    #[test]
    fn reference_to_undeclared_resource_fails() {
        let mut other = DeclarationSetBuilder::new();
        let foreign = other.declare(vpc()).unwrap();

        let mut builder = DeclarationSetBuilder::new();
        let err = builder
            .declare(
                Resource::new("subnet", "public")
                    .with_attribute("vpc_id", foreign.reference("id")),
            )
            .unwrap_err();
        assert!(matches!(err, DeclarationError::DanglingReference { .. }));

        assert!(matches!(
            builder.reference(&foreign, "id"),
            Err(DeclarationError::DanglingReference { .. })
        ));
        assert!(matches!(
            builder.export("vpcId", &foreign, "id"),
            Err(DeclarationError::DanglingReference { .. })
        ));
    }

    #[test]
    fn reference_field_is_not_validated() {
        let mut builder = DeclarationSetBuilder::new();
        let vpc = builder.declare(vpc()).unwrap();
        let value = builder.reference(&vpc, "no_such_field").unwrap();
        assert_eq!(
            value.as_reference().map(|r| r.attribute.as_str()),
            Some("no_such_field")
        );
    }

    #[test]
    fn exports_keep_registration_order() {
        let mut builder = DeclarationSetBuilder::new();
        let vpc = builder.declare(vpc()).unwrap();
        builder.export("b", &vpc, "id").unwrap();
        builder.export("a", &vpc, "cidr_block").unwrap();
        let set = builder.build().unwrap();

        let names: Vec<_> = set.exports().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(set.export("a").unwrap().attribute, "cidr_block");
        assert!(set.export("c").is_none());
    }

    #[test]
    fn equivalence_ignores_declaration_order() {
        let build = |first: &str, second: &str| {
            let mut builder = DeclarationSetBuilder::new();
            let vpc = builder.declare(vpc()).unwrap();
            for name in [first, second] {
                builder
                    .declare(
                        Resource::new("subnet", name)
                            .with_attribute("vpc_id", vpc.reference("id")),
                    )
                    .unwrap();
            }
            builder.build().unwrap()
        };

        assert!(build("a", "b").is_equivalent(&build("b", "a")));
        assert!(!build("a", "b").is_equivalent(&build("a", "c")));
    }

    #[test]
    fn json_marks_references_and_dependencies() {
        let mut builder = DeclarationSetBuilder::new();
        let vpc = builder.declare(vpc()).unwrap();
        builder
            .declare(
                Resource::new("subnet", "public")
                    .with_attribute("vpc_id", vpc.reference("id")),
            )
            .unwrap();
        builder.export("vpcId", &vpc, "id").unwrap();

        let json = builder.build().unwrap().to_json();
        assert_eq!(json["resources"][1]["depends_on"][0], "vpc.main");
        assert_eq!(
            json["resources"][1]["attributes"]["vpc_id"]["$ref"],
            "vpc.main.id"
        );
        assert_eq!(json["exports"]["vpcId"]["$ref"], "vpc.main.id");
    }

    fn rule(from_port: i64, to_port: i64) -> Value {
        Value::map([
            ("protocol", Value::from("tcp")),
            ("from_port", Value::Int(from_port)),
            ("to_port", Value::Int(to_port)),
            ("cidr_blocks", Value::List(vec![Value::from("0.0.0.0/0")])),
        ])
    }

    fn security_group_set(ingress: Vec<Value>) -> DeclarationSet {
        let mut builder = DeclarationSetBuilder::new();
        let vpc = builder.declare(vpc()).unwrap();
        builder
            .declare(
                Resource::new(ec2::SECURITY_GROUP, "web")
                    .with_attribute("vpc_id", vpc.reference("id"))
                    .with_attribute("ingress", Value::List(ingress)),
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn validate_accepts_ordered_port_ranges() {
        let schemas: SchemaRegistry = ec2::schemas().into_iter().collect();
        let set = security_group_set(vec![rule(80, 80), rule(1024, 2048)]);
        assert!(set.validate(&schemas).is_ok());
    }

    #[test]
    fn validate_rejects_inverted_port_range() {
        let schemas: SchemaRegistry = ec2::schemas().into_iter().collect();
        let set = security_group_set(vec![rule(22, 22), rule(443, 80)]);

        let errors = set.validate(&schemas).unwrap_err();
        assert_eq!(errors.len(), 1);
        let (id, error) = &errors[0];
        assert_eq!(id, &ResourceId::new(ec2::SECURITY_GROUP, "web"));
        assert_eq!(
            error.to_string(),
            "Attribute 'ingress': List item at index 1: Validation failed: \
             Invalid port range 443-80: from_port must not exceed to_port"
        );
    }
}
