//! Diagnostics - Policy checks that warn without rejecting a declaration set

use std::collections::BTreeSet;
use std::fmt;

use log::warn;

use crate::access::Cidr;
use crate::declaration::DeclarationSet;
use crate::providers::ec2;
use crate::resource::{ResourceId, Value};
use crate::schema::region_of_zone;

/// A warning about a declaration set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Resource the finding is about, if any
    pub resource: Option<ResourceId>,
    pub message: String,
}

impl Diagnostic {
    fn warning(resource: Option<ResourceId>, message: impl Into<String>) -> Self {
        Self {
            resource,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(id) => write!(f, "warning: [{}] {}", id, self.message),
            None => write!(f, "warning: {}", self.message),
        }
    }
}

/// Run every check against the set. `region`, when given, is the region
/// placement is expected in.
pub fn check(set: &DeclarationSet, region: Option<&str>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_default_routes(set, &mut diagnostics);
    check_zone_spread(set, &mut diagnostics);
    check_zone_region(set, region, &mut diagnostics);
    check_subnet_zones(set, &mut diagnostics);
    check_embedded_keys(set, &mut diagnostics);

    for d in &diagnostics {
        warn!("{}", d);
    }
    diagnostics
}

fn check_default_routes(set: &DeclarationSet, out: &mut Vec<Diagnostic>) {
    for rt in set.of_type(ec2::ROUTE_TABLE) {
        let defaults = rt
            .attribute("routes")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|route| route.as_map()?.get("cidr_block")?.as_str())
            .filter_map(|cidr| cidr.parse::<Cidr>().ok())
            .filter(Cidr::is_default_route)
            .count();
        if defaults > 1 {
            out.push(Diagnostic::warning(
                Some(rt.id.clone()),
                format!("{} default routes (0.0.0.0/0); at most one is expected", defaults),
            ));
        }
    }
}

fn placed_zones(set: &DeclarationSet) -> Vec<(ResourceId, String)> {
    set.of_type(ec2::SUBNET)
        .chain(set.of_type(ec2::INSTANCE))
        .filter_map(|r| {
            let zone = r.attribute("availability_zone")?.as_str()?;
            Some((r.id.clone(), zone.to_string()))
        })
        .collect()
}

fn check_zone_spread(set: &DeclarationSet, out: &mut Vec<Diagnostic>) {
    let placed = placed_zones(set);
    let zones: BTreeSet<&str> = placed.iter().map(|(_, z)| z.as_str()).collect();
    if placed.len() > 1 && zones.len() == 1 {
        let zone = zones.into_iter().next().unwrap_or_default();
        out.push(Diagnostic::warning(
            None,
            format!(
                "all {} placed resources are in a single availability zone ({}); \
                 the stack has no zone redundancy",
                placed.len(),
                zone
            ),
        ));
    }
}

fn check_zone_region(set: &DeclarationSet, region: Option<&str>, out: &mut Vec<Diagnostic>) {
    let Some(region) = region else {
        return;
    };
    for (id, zone) in placed_zones(set) {
        if region_of_zone(&zone) != region {
            out.push(Diagnostic::warning(
                Some(id),
                format!("availability zone {} is outside region {}", zone, region),
            ));
        }
    }
}

/// An instance launches in its subnet's zone; a different declared zone cannot be provisioned
fn check_subnet_zones(set: &DeclarationSet, out: &mut Vec<Diagnostic>) {
    for instance in set.of_type(ec2::INSTANCE) {
        let Some(zone) = instance.attribute("availability_zone").and_then(Value::as_str) else {
            continue;
        };
        let Some(subnet) = instance
            .attribute("subnet_id")
            .and_then(Value::as_reference)
            .and_then(|r| set.get(&r.target))
        else {
            continue;
        };
        if let Some(subnet_zone) = subnet.attribute("availability_zone").and_then(Value::as_str)
            && subnet_zone != zone
        {
            out.push(Diagnostic::warning(
                Some(instance.id.clone()),
                format!(
                    "availability zone {} differs from zone {} of subnet {}",
                    zone, subnet_zone, subnet.id
                ),
            ));
        }
    }
}

fn check_embedded_keys(set: &DeclarationSet, out: &mut Vec<Diagnostic>) {
    for key_pair in set.of_type(ec2::KEY_PAIR) {
        if let Some(Value::String(_)) = key_pair.attribute("public_key") {
            out.push(Diagnostic::warning(
                Some(key_pair.id.clone()),
                "public key material is embedded literally in the declaration",
            ));
        }
    }
}
