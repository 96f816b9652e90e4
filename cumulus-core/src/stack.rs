//! Stack - The web stack: one public subnet, two SSH/HTTP instances
//!
//! Exports `vpcId`, `instance1PublicIp` and `instance2PublicIp`.

use crate::config::StackConfig;
use crate::declaration::{DeclarationError, DeclarationSet, DeclarationSetBuilder, Handle};
use crate::providers::ec2;
use crate::resource::{Resource, Value};

const ANYWHERE: &str = "0.0.0.0/0";

fn rule(protocol: &str, from_port: i64, to_port: i64) -> Value {
    Value::map([
        ("protocol", Value::from(protocol)),
        ("from_port", Value::Int(from_port)),
        ("to_port", Value::Int(to_port)),
        ("cidr_blocks", Value::List(vec![Value::from(ANYWHERE)])),
    ])
}

/// Handles of the shared resources every instance is wired to
struct Placement<'a> {
    subnet: &'a Handle,
    security_group: &'a Handle,
    key_pair: &'a Handle,
}

fn instance(config: &StackConfig, name: &str, zone: &str, placement: &Placement<'_>) -> Resource {
    Resource::new(ec2::INSTANCE, name)
        .with_attribute("instance_type", config.instance_type.as_str())
        .with_attribute("ami", config.ami.as_str())
        .with_attribute("subnet_id", placement.subnet.reference("id"))
        .with_attribute("associate_public_ip_address", true)
        .with_attribute(
            "vpc_security_group_ids",
            Value::List(vec![placement.security_group.reference("id")]),
        )
        .with_attribute("availability_zone", zone)
        .with_attribute("key_name", placement.key_pair.reference("key_name"))
        .with_name_tag(name)
}

/// Declare the web stack
pub fn web_stack(config: &StackConfig) -> Result<DeclarationSet, DeclarationError> {
    let mut stack = DeclarationSetBuilder::new();

    let vpc = stack.declare(
        Resource::new(ec2::VPC, "my-vpc")
            .with_attribute("cidr_block", config.vpc_cidr.as_str())
            .with_attribute("enable_dns_hostnames", true)
            .with_attribute("enable_dns_support", true)
            .with_name_tag("my-vpc"),
    )?;

    let igw = stack.declare(
        Resource::new(ec2::INTERNET_GATEWAY, "my-igw")
            .with_attribute("vpc_id", stack.reference(&vpc, "id")?)
            .with_name_tag("my-igw"),
    )?;

    let subnet = stack.declare(
        Resource::new(ec2::SUBNET, "public-subnet")
            .with_attribute("vpc_id", stack.reference(&vpc, "id")?)
            .with_attribute("cidr_block", config.subnet_cidr.as_str())
            .with_attribute("availability_zone", config.availability_zone.as_str())
            .with_attribute("map_public_ip_on_launch", true)
            .with_name_tag("public-subnet"),
    )?;

    let route_table = stack.declare(
        Resource::new(ec2::ROUTE_TABLE, "public-rt")
            .with_attribute("vpc_id", stack.reference(&vpc, "id")?)
            .with_attribute(
                "routes",
                Value::List(vec![Value::map([
                    ("cidr_block", Value::from(ANYWHERE)),
                    ("gateway_id", stack.reference(&igw, "id")?),
                ])]),
            )
            .with_name_tag("public-rt"),
    )?;

    stack.declare(
        Resource::new(ec2::ROUTE_TABLE_ASSOCIATION, "public-rta")
            .with_attribute("subnet_id", stack.reference(&subnet, "id")?)
            .with_attribute("route_table_id", stack.reference(&route_table, "id")?),
    )?;

    let security_group = stack.declare(
        Resource::new(ec2::SECURITY_GROUP, "web-sg")
            .with_attribute("description", "Allow inbount HTTP and SSH traffic")
            .with_attribute("vpc_id", stack.reference(&vpc, "id")?)
            .with_attribute(
                "ingress",
                Value::List(vec![rule("tcp", 80, 80), rule("tcp", 22, 22)]),
            )
            .with_attribute("egress", Value::List(vec![rule("-1", 0, 0)]))
            .with_name_tag("web-sg"),
    )?;

    let key_pair = stack.declare(
        Resource::new(ec2::KEY_PAIR, "my-key-pair")
            .with_attribute("public_key", config.public_key.as_str()),
    )?;

    let placement = Placement {
        subnet: &subnet,
        security_group: &security_group,
        key_pair: &key_pair,
    };
    let [zone1, zone2] = &config.instance_zones;
    let instance1 = stack.declare(instance(config, "instance-1", zone1, &placement))?;
    let instance2 = stack.declare(instance(config, "instance-2", zone2, &placement))?;

    stack.export("vpcId", &vpc, "id")?;
    stack.export("instance1PublicIp", &instance1, "public_ip")?;
    stack.export("instance2PublicIp", &instance2, "public_ip")?;

    stack.build()
}
