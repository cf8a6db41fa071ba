// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster inventory: raw Ingress, Service and Pod objects and their flattening
//! into topology entries

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{LoadBalancerStatus, Pod, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerStatus};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::{debug, trace};

use super::client::ClusterClient;
use crate::topology::{IngressPathEntry, NamedPort, PodPortEntry, PortRef, ServicePortEntry};

/// Annotation external-dns reads the public hostname of a Service from
const EXTERNAL_HOSTNAME_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/hostname";

/// Label/selector key that ties Services to Pods
const APP_KEY: &str = "app";

/// Source of raw cluster objects
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>>;
    async fn list_services(&self) -> Result<Vec<Service>>;
    async fn list_pods(&self) -> Result<Vec<Pod>>;
}

/// Inventory read from a live cluster, all namespaces
pub struct KubeInventory {
    client: ClusterClient,
}

impl KubeInventory {
    pub fn new(client: ClusterClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InventoryProvider for KubeInventory {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>> {
        self.client.list_all::<Ingress>().await
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        self.client.list_all::<Service>().await
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        self.client.list_all::<Pod>().await
    }
}

/// One entry per ingress rule x HTTP path with a service backend
pub fn ingress_path_entries(ingresses: &[Ingress]) -> Vec<IngressPathEntry> {
    let mut entries = Vec::new();

    for ingress in ingresses {
        let name = ingress.metadata.name.clone().unwrap_or_default();
        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
        let ip_address = ingress
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(first_ingress_lb_ip);

        let rules = ingress
            .spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for rule in rules {
            let Some(http) = rule.http.as_ref() else {
                continue;
            };
            for path in &http.paths {
                let Some(backend) = path.backend.service.as_ref() else {
                    trace!(ingress = %name, "Skipping path with non-service backend");
                    continue;
                };
                let Some(port) = backend.port.as_ref().and_then(|p| {
                    p.number
                        .map(PortRef::Number)
                        .or_else(|| p.name.clone().map(PortRef::Name))
                }) else {
                    trace!(ingress = %name, service = %backend.name, "Skipping backend without port");
                    continue;
                };

                entries.push(IngressPathEntry {
                    host: rule.host.clone().unwrap_or_default(),
                    path: path.path.clone().unwrap_or_else(|| "/".to_string()),
                    ip_address,
                    namespace: namespace.clone(),
                    ingress_name: name.clone(),
                    backend_service_name: backend.name.clone(),
                    backend_service_port: port,
                });
            }
        }
    }

    debug!(count = entries.len(), "Flattened ingress paths");
    entries
}

/// One entry per declared Service port
pub fn service_port_entries(services: &[Service]) -> Vec<ServicePortEntry> {
    let mut entries = Vec::new();

    for service in services {
        let Some(spec) = service.spec.as_ref() else {
            continue;
        };
        let external_hostname = label(&service.metadata.annotations, EXTERNAL_HOSTNAME_ANNOTATION)
            .unwrap_or_default();
        let external_ip = service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(first_service_lb_ip);
        let app_selector = label(&spec.selector, APP_KEY);
        let cluster_ip = spec.cluster_ip.as_deref().and_then(parse_ip);

        for port in spec.ports.iter().flatten() {
            let target_port = match &port.target_port {
                Some(IntOrString::Int(n)) => PortRef::Number(*n),
                Some(IntOrString::String(s)) => match s.parse::<i32>() {
                    Ok(n) => PortRef::Number(n),
                    Err(_) => PortRef::Name(s.clone()),
                },
                // Kubernetes defaults targetPort to port
                None => PortRef::Number(port.port),
            };

            entries.push(ServicePortEntry {
                service_name: service.metadata.name.clone().unwrap_or_default(),
                namespace: service.metadata.namespace.clone().unwrap_or_default(),
                service_type: spec.type_.clone().unwrap_or_else(|| "ClusterIP".to_string()),
                cluster_ip,
                external_ip,
                external_hostname: external_hostname.clone(),
                app_selector: app_selector.clone(),
                source_port: NamedPort {
                    number: port.port,
                    name: port.name.clone().filter(|n| !n.is_empty()),
                },
                target_port,
                node_port: port.node_port,
            });
        }
    }

    debug!(count = entries.len(), "Flattened service ports");
    entries
}

/// One entry per container port of every Pod
pub fn pod_port_entries(pods: &[Pod]) -> Vec<PodPortEntry> {
    let mut entries = Vec::new();

    for pod in pods {
        let Some(spec) = pod.spec.as_ref() else {
            continue;
        };
        let app_label = label(&pod.metadata.labels, APP_KEY);
        let pod_phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_default();

        for container in &spec.containers {
            for port in container.ports.iter().flatten() {
                entries.push(PodPortEntry {
                    pod_name: pod.metadata.name.clone().unwrap_or_default(),
                    namespace: pod.metadata.namespace.clone().unwrap_or_default(),
                    app_label: app_label.clone(),
                    container_name: container.name.clone(),
                    container_image: container.image.clone().unwrap_or_default(),
                    container_port: NamedPort {
                        number: port.container_port,
                        name: port.name.clone().filter(|n| !n.is_empty()),
                    },
                    protocol: port.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                    host_ip: port.host_ip.as_deref().and_then(parse_ip),
                    pod_phase: pod_phase.clone(),
                });
            }
        }
    }

    debug!(count = entries.len(), "Flattened pod ports");
    entries
}

fn label(map: &Option<BTreeMap<String, String>>, key: &str) -> Option<String> {
    map.as_ref().and_then(|m| m.get(key)).cloned()
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.parse().ok()
}

fn first_ingress_lb_ip(status: &IngressLoadBalancerStatus) -> Option<IpAddr> {
    status
        .ingress
        .as_ref()?
        .first()?
        .ip
        .as_deref()
        .and_then(parse_ip)
}

fn first_service_lb_ip(status: &LoadBalancerStatus) -> Option<IpAddr> {
    status
        .ingress
        .as_ref()?
        .first()?
        .ip
        .as_deref()
        .and_then(parse_ip)
}
