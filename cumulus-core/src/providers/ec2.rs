//! EC2 resource schema definitions

use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub const VPC: &str = "vpc";
pub const INTERNET_GATEWAY: &str = "internet_gateway";
pub const SUBNET: &str = "subnet";
pub const ROUTE_TABLE: &str = "route_table";
pub const ROUTE_TABLE_ASSOCIATION: &str = "route_table_association";
pub const SECURITY_GROUP: &str = "security_group";
pub const KEY_PAIR: &str = "key_pair";
pub const INSTANCE: &str = "instance";

/// Protocol type for security group rules
pub fn protocol() -> AttributeType {
    AttributeType::Enum(vec![
        "tcp".to_string(),
        "udp".to_string(),
        "-1".to_string(), // All traffic
    ])
}

fn tags() -> AttributeSchema {
    AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
        .with_description("Resource tags; `Name` is the display label")
}

fn vpc_id(what: &str) -> AttributeSchema {
    AttributeSchema::new("vpc_id", AttributeType::String)
        .required()
        .with_description(format!("VPC that owns the {}", what))
}

/// A single route: destination block and next hop
fn route() -> AttributeType {
    AttributeType::Struct {
        name: "Route".to_string(),
        fields: vec![
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("Destination CIDR block"),
            AttributeSchema::new("gateway_id", AttributeType::String)
                .with_description("Internet gateway used as next hop"),
        ],
    }
}

/// A security group rule: protocol, port range and address blocks
fn access_rule() -> AttributeType {
    AttributeType::Struct {
        name: "AccessRule".to_string(),
        fields: vec![
            AttributeSchema::new("protocol", protocol())
                .required()
                .with_description("Protocol (tcp, udp, or -1 for all)"),
            AttributeSchema::new("from_port", types::port_number())
                .required()
                .with_description("Start of port range"),
            AttributeSchema::new("to_port", types::port_number())
                .required()
                .with_description("End of port range"),
            AttributeSchema::new("cidr_blocks", AttributeType::List(Box::new(types::cidr())))
                .with_description("Source (ingress) or destination (egress) blocks"),
        ],
    }
}

/// Returns the schema for VPC
pub fn vpc_schema() -> ResourceSchema {
    ResourceSchema::new(VPC)
        .with_description("An AWS VPC (Virtual Private Cloud)")
        .with_computed_id()
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 CIDR block for the VPC"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_support", AttributeType::Bool)
                .with_description("Enable DNS resolution support"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool)
                .with_description("Enable DNS hostnames"),
        )
        .attribute(tags())
}

/// Returns the schema for Internet Gateway
pub fn internet_gateway_schema() -> ResourceSchema {
    ResourceSchema::new(INTERNET_GATEWAY)
        .with_description("An AWS Internet Gateway")
        .with_computed_id()
        .attribute(vpc_id("Internet Gateway"))
        .attribute(tags())
}

/// Returns the schema for Subnet
pub fn subnet_schema() -> ResourceSchema {
    ResourceSchema::new(SUBNET)
        .with_description("An AWS VPC Subnet")
        .with_computed_id()
        .attribute(vpc_id("subnet"))
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 CIDR block for the subnet"),
        )
        .attribute(
            AttributeSchema::new("availability_zone", types::availability_zone())
                .with_description("The availability zone for the subnet"),
        )
        .attribute(
            AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool)
                .with_description("Assign a public IPv4 address to instances launched here"),
        )
        .attribute(tags())
}

/// Returns the schema for Route Table
pub fn route_table_schema() -> ResourceSchema {
    ResourceSchema::new(ROUTE_TABLE)
        .with_description("An AWS VPC Route Table")
        .with_computed_id()
        .attribute(vpc_id("Route Table"))
        .attribute(
            AttributeSchema::new("routes", AttributeType::List(Box::new(route())))
                .with_description("Ordered list of routes"),
        )
        .attribute(tags())
}

/// Returns the schema for Route Table Association
pub fn route_table_association_schema() -> ResourceSchema {
    ResourceSchema::new(ROUTE_TABLE_ASSOCIATION)
        .with_description("Associates a subnet with a route table")
        .with_computed_id()
        .attribute(
            AttributeSchema::new("subnet_id", AttributeType::String)
                .required()
                .with_description("Subnet to associate"),
        )
        .attribute(
            AttributeSchema::new("route_table_id", AttributeType::String)
                .required()
                .with_description("Route table to associate"),
        )
}

/// Returns the schema for Security Group
pub fn security_group_schema() -> ResourceSchema {
    ResourceSchema::new(SECURITY_GROUP)
        .with_description("An AWS VPC Security Group")
        .with_computed_id()
        .attribute(vpc_id("Security Group"))
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_description("Description of the Security Group"),
        )
        .attribute(
            AttributeSchema::new("ingress", AttributeType::List(Box::new(access_rule())))
                .with_description("Ordered inbound rules"),
        )
        .attribute(
            AttributeSchema::new("egress", AttributeType::List(Box::new(access_rule())))
                .with_description("Ordered outbound rules"),
        )
        .attribute(tags())
}

/// Returns the schema for Key Pair
pub fn key_pair_schema() -> ResourceSchema {
    ResourceSchema::new(KEY_PAIR)
        .with_description("An EC2 key pair holding public key material")
        .with_computed_id()
        .attribute(
            AttributeSchema::new("public_key", AttributeType::String)
                .required()
                .with_description("OpenSSH public key material"),
        )
        .attribute(
            AttributeSchema::new("key_name", AttributeType::String)
                .computed()
                .with_description("Name assigned to the key pair"),
        )
}

/// Returns the schema for EC2 Instance
pub fn instance_schema() -> ResourceSchema {
    ResourceSchema::new(INSTANCE)
        .with_description("An EC2 instance")
        .with_computed_id()
        .attribute(
            AttributeSchema::new("ami", AttributeType::String)
                .required()
                .with_description("Machine image identifier"),
        )
        .attribute(
            AttributeSchema::new("instance_type", AttributeType::String)
                .required()
                .with_description("Instance size (e.g., t3.small)"),
        )
        .attribute(
            AttributeSchema::new("subnet_id", AttributeType::String)
                .required()
                .with_description("Subnet to launch into"),
        )
        .attribute(AttributeSchema::new(
            "associate_public_ip_address",
            AttributeType::Bool,
        ))
        .attribute(
            AttributeSchema::new(
                "vpc_security_group_ids",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .with_description("Attached security groups"),
        )
        .attribute(AttributeSchema::new(
            "availability_zone",
            types::availability_zone(),
        ))
        .attribute(
            AttributeSchema::new("key_name", AttributeType::String)
                .with_description("Key pair authorized for SSH"),
        )
        .attribute(
            AttributeSchema::new("public_ip", AttributeType::String)
                .computed()
                .with_description("Public IPv4 address"),
        )
        .attribute(tags())
}

/// Returns all EC2-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        vpc_schema(),
        internet_gateway_schema(),
        subnet_schema(),
        route_table_schema(),
        route_table_association_schema(),
        security_group_schema(),
        key_pair_schema(),
        instance_schema(),
    ]
}
