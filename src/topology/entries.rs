// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// A port reference that is either a number or a port name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PortRef {
    Number(i32),
    Name(String),
}

impl PortRef {
    /// Whether this reference points at `port`, by number or by name
    pub fn matches(&self, port: &NamedPort) -> bool {
        match self {
            PortRef::Number(number) => *number == port.number,
            PortRef::Name(name) => port.name.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRef::Number(n) => write!(f, "{}", n),
            PortRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// A declared port: always numbered, optionally named
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedPort {
    pub number: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl NamedPort {
    pub fn new(number: i32) -> Self {
        Self { number, name: None }
    }

    pub fn named(number: i32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for NamedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.number),
            None => write!(f, "{}", self.number),
        }
    }
}

/// One (ingress rule x HTTP path)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressPathEntry {
    pub host: String,
    pub path: String,
    pub ip_address: Option<IpAddr>,
    pub namespace: String,
    pub ingress_name: String,
    pub backend_service_name: String,
    pub backend_service_port: PortRef,
}

/// One exposed port of a Service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServicePortEntry {
    pub service_name: String,
    pub namespace: String,
    pub service_type: String,
    pub cluster_ip: Option<IpAddr>,
    pub external_ip: Option<IpAddr>,
    pub external_hostname: String,
    pub app_selector: Option<String>,
    pub source_port: NamedPort,
    pub target_port: PortRef,
    pub node_port: Option<i32>,
}

/// One exposed container port of a Pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodPortEntry {
    pub pod_name: String,
    pub namespace: String,
    pub app_label: Option<String>,
    pub container_name: String,
    pub container_image: String,
    pub container_port: NamedPort,
    pub protocol: String,
    pub host_ip: Option<IpAddr>,
    pub pod_phase: String,
}

impl PodPortEntry {
    pub fn is_running(&self) -> bool {
        self.pod_phase == "Running"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_ref_by_number_ignores_name() {
        let port = NamedPort::named(80, "http");
        assert!(PortRef::Number(80).matches(&port));
        assert!(!PortRef::Number(81).matches(&port));
    }

    #[test]
    fn test_port_ref_by_name_ignores_number() {
        assert!(PortRef::Name("http".to_string()).matches(&NamedPort::named(8080, "http")));
        assert!(!PortRef::Name("http".to_string()).matches(&NamedPort::named(80, "web")));
    }

    #[test]
    fn test_port_ref_name_never_matches_unnamed_port() {
        assert!(!PortRef::Name(String::new()).matches(&NamedPort::new(80)));
    }

    #[test]
    fn test_named_port_display() {
        assert_eq!(NamedPort::named(80, "http").to_string(), "http (80)");
        assert_eq!(NamedPort::new(8080).to_string(), "8080");
    }
}
