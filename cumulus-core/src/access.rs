//! Access - Typed security group rules and their evaluation

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::providers::ec2;
use crate::resource::{Resource, Value};
use crate::schema::{TypeError, validate_cidr};

/// Errors reading or validating an access rule
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("Unrecognized protocol '{0}', expected tcp, udp or -1")]
    UnknownProtocol(String),

    #[error("Invalid port range {from_port}-{to_port}: from_port must not exceed to_port")]
    InvalidPortRange { from_port: i64, to_port: i64 },

    #[error("Port {0} is out of range 0-65535")]
    PortOutOfRange(i64),

    #[error("{0}")]
    InvalidCidr(String),

    #[error("Rule field '{0}' is missing or has the wrong type")]
    MalformedField(&'static str),

    #[error("{0} is not a security group")]
    NotASecurityGroup(String),
}

/// Rule protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    /// Every protocol and every port
    All,
}

impl FromStr for Protocol {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "-1" => Ok(Protocol::All),
            other => Err(RuleError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::All => write!(f, "-1"),
        }
    }
}

/// IPv4 address block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    pub network: Ipv4Addr,
    pub prefix: u8,
}

impl Cidr {
    /// 0.0.0.0/0
    pub const ANY: Cidr = Cidr {
        network: Ipv4Addr::UNSPECIFIED,
        prefix: 0,
    };

    fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = self.mask();
        u32::from(addr) & mask == u32::from(self.network) & mask
    }

    pub fn is_default_route(&self) -> bool {
        self.prefix == 0
    }
}

impl FromStr for Cidr {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_cidr(s).map_err(RuleError::InvalidCidr)?;
        let (ip, prefix) = s
            .split_once('/')
            .ok_or_else(|| RuleError::InvalidCidr(s.to_string()))?;
        let network = ip
            .parse::<Ipv4Addr>()
            .map_err(|e| RuleError::InvalidCidr(format!("{}: {}", s, e)))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|e| RuleError::InvalidCidr(format!("{}: {}", s, e)))?;
        Ok(Cidr { network, prefix })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// A single allow rule of a security group
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRule {
    pub protocol: Protocol,
    pub from_port: u16,
    pub to_port: u16,
    /// Allowed sources (ingress) or destinations (egress)
    pub cidr_blocks: Vec<Cidr>,
}

impl AccessRule {
    /// Build a rule, checking the port range
    pub fn new(
        protocol: Protocol,
        from_port: i64,
        to_port: i64,
        cidr_blocks: Vec<Cidr>,
    ) -> Result<Self, RuleError> {
        let port = |p: i64| u16::try_from(p).map_err(|_| RuleError::PortOutOfRange(p));
        let (from, to) = (port(from_port)?, port(to_port)?);
        if from > to {
            return Err(RuleError::InvalidPortRange { from_port, to_port });
        }
        Ok(Self {
            protocol,
            from_port: from,
            to_port: to,
            cidr_blocks,
        })
    }

    /// Parse a rule from its declared map form
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        let map = value.as_map().ok_or(RuleError::MalformedField("rule"))?;

        let protocol = map
            .get("protocol")
            .and_then(Value::as_str)
            .ok_or(RuleError::MalformedField("protocol"))?
            .parse::<Protocol>()?;
        let from_port = map
            .get("from_port")
            .and_then(Value::as_int)
            .ok_or(RuleError::MalformedField("from_port"))?;
        let to_port = map
            .get("to_port")
            .and_then(Value::as_int)
            .ok_or(RuleError::MalformedField("to_port"))?;

        let cidr_blocks = match map.get("cidr_blocks") {
            None => Vec::new(),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| -> Result<Cidr, RuleError> {
                    item.as_str()
                        .ok_or(RuleError::MalformedField("cidr_blocks"))?
                        .parse()
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(RuleError::MalformedField("cidr_blocks")),
        };

        Self::new(protocol, from_port, to_port, cidr_blocks)
    }

    /// Declared map form of this rule
    pub fn to_value(&self) -> Value {
        Value::map([
            ("protocol", Value::String(self.protocol.to_string())),
            ("from_port", Value::Int(i64::from(self.from_port))),
            ("to_port", Value::Int(i64::from(self.to_port))),
            (
                "cidr_blocks",
                Value::List(
                    self.cidr_blocks
                        .iter()
                        .map(|c| Value::String(c.to_string()))
                        .collect(),
                ),
            ),
        ])
    }

    /// Whether traffic of `protocol` on `port` to or from `addr` is allowed
    pub fn permits(&self, protocol: Protocol, port: u16, addr: Ipv4Addr) -> bool {
        let protocol_ok = match self.protocol {
            Protocol::All => true,
            p => p == protocol && (self.from_port..=self.to_port).contains(&port),
        };
        protocol_ok && self.cidr_blocks.iter().any(|c| c.contains(addr))
    }
}

/// Ingress and egress rules of one security group
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccessPolicy {
    pub ingress: Vec<AccessRule>,
    pub egress: Vec<AccessRule>,
}

impl AccessPolicy {
    /// Read the rules declared on a security group resource
    pub fn from_resource(resource: &Resource) -> Result<Self, RuleError> {
        if resource.id.resource_type != ec2::SECURITY_GROUP {
            return Err(RuleError::NotASecurityGroup(resource.id.to_string()));
        }

        let rules = |key: &str| -> Result<Vec<AccessRule>, RuleError> {
            match resource.attribute(key) {
                None => Ok(Vec::new()),
                Some(Value::List(items)) => items.iter().map(AccessRule::from_value).collect(),
                Some(_) => Err(RuleError::MalformedField("rules")),
            }
        };

        Ok(Self {
            ingress: rules("ingress")?,
            egress: rules("egress")?,
        })
    }

    pub fn allows_ingress(&self, protocol: Protocol, port: u16, source: Ipv4Addr) -> bool {
        self.ingress.iter().any(|r| r.permits(protocol, port, source))
    }

    pub fn allows_egress(&self, protocol: Protocol, port: u16, destination: Ipv4Addr) -> bool {
        self.egress
            .iter()
            .any(|r| r.permits(protocol, port, destination))
    }
}

/// Port ranges in a security group's rules where `from_port` exceeds `to_port`.
///
/// Per-field types are left to the schema; this is the one constraint that
/// spans two fields of a rule.
pub fn port_range_errors(resource: &Resource) -> Vec<TypeError> {
    let mut errors = Vec::new();
    for key in ["ingress", "egress"] {
        let rules = resource
            .attribute(key)
            .and_then(Value::as_list)
            .unwrap_or_default();
        for (index, rule) in rules.iter().enumerate() {
            let ports = rule.as_map().and_then(|map| {
                Some((
                    map.get("from_port")?.as_int()?,
                    map.get("to_port")?.as_int()?,
                ))
            });
            if let Some((from_port, to_port)) = ports
                && from_port > to_port
            {
                let error = RuleError::InvalidPortRange { from_port, to_port };
                errors.push(TypeError::AttributeError {
                    name: key.to_string(),
                    inner: Box::new(TypeError::ListItemError {
                        index,
                        inner: Box::new(TypeError::ValidationFailed {
                            message: error.to_string(),
                        }),
                    }),
                });
            }
        }
    }
    errors
}
