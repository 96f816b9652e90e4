//! Config - Placement and sizing parameters of the web stack
//!
//! Every field defaults to the value the stack has always been declared with,
//! so an empty `{}` file reproduces it exactly.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parameters of the web stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Region the stack is provisioned in
    pub region: String,
    /// Zone for the subnet
    pub availability_zone: String,
    /// Zones for the two instances, in order
    pub instance_zones: [String; 2],
    pub vpc_cidr: String,
    pub subnet_cidr: String,
    pub ami: String,
    pub instance_type: String,
    /// OpenSSH public key registered as the stack's key pair
    pub public_key: String,
}

const DEFAULT_ZONE: &str = "ap-southeast-1a";

const DEFAULT_PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQCh40P2QNGlv/pDC8TFcypKPP7mPxmnLruMv0eHihu7nGjtp6m/o3wtYjhFUNCFXSeaV+VlV1QnhN9+Ho+o7wLmD/zfzTjkbbTCqUfxWLxnBKN0ZLx50SYotlZqJlztlVhwA/AJZ+z+z2ONK9wmvgKdhaltLBlInh9VrJKeswvOFF602FzJg1YaE7U2r/7zGziVXPCTBFWNbspOP5OeiDAYDK3rv0H42lbR8x3CiWvQQvm5NYb0dKQGrB8EsyT4Ae/idm//LgoVu2QV+a6b/ar2jTOn3IuxPixm0WgLqVps8dZIX4lDt/coAgNdkUxUUPyxF0mGjhao9En30QrUIL3l root@d60fe3ebf112aaf8";

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            region: "ap-southeast-1".to_string(),
            availability_zone: DEFAULT_ZONE.to_string(),
            instance_zones: [DEFAULT_ZONE.to_string(), DEFAULT_ZONE.to_string()],
            vpc_cidr: "10.0.0.0/16".to_string(),
            subnet_cidr: "10.0.1.0/24".to_string(),
            ami: "ami-047126e50991d067b".to_string(),
            instance_type: "t3.small".to_string(),
            public_key: DEFAULT_PUBLIC_KEY.to_string(),
        }
    }
}

impl StackConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
