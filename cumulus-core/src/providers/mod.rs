//! Providers - Resource schemas per cloud service

pub mod ec2;
