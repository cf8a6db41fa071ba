// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory snapshot of cluster routing topology
//!
//! Holds every Ingress path, Service port and Pod port flattened into entries and
//! answers exact-match queries in both directions of the Ingress -> Service -> Pod
//! chain. The index is built once per run and never mutated afterwards.

mod entries;

pub use entries::{IngressPathEntry, NamedPort, PodPortEntry, PortRef, ServicePortEntry};

use tracing::{debug, error, info};

use crate::error::{Hop, LookupError};
use crate::kubernetes::inventory::{self, InventoryProvider};
use crate::target::Target;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyIndex {
    ingress_paths: Vec<IngressPathEntry>,
    service_ports: Vec<ServicePortEntry>,
    pod_ports: Vec<PodPortEntry>,
}

impl TopologyIndex {
    pub fn new(
        ingress_paths: Vec<IngressPathEntry>,
        service_ports: Vec<ServicePortEntry>,
        pod_ports: Vec<PodPortEntry>,
    ) -> Self {
        Self {
            ingress_paths,
            service_ports,
            pod_ports,
        }
    }

    /// Build the index from a cluster inventory
    ///
    /// A failed listing contributes an empty collection for that resource kind;
    /// the error is logged and the run goes on with whatever else was fetched.
    pub async fn load(provider: &dyn InventoryProvider) -> Self {
        let ingress_paths = match provider.list_ingresses().await {
            Ok(items) => inventory::ingress_path_entries(&items),
            Err(e) => {
                error!(error = %e, "Failed to list ingresses, continuing without them");
                Vec::new()
            }
        };

        let service_ports = match provider.list_services().await {
            Ok(items) => inventory::service_port_entries(&items),
            Err(e) => {
                error!(error = %e, "Failed to list services, continuing without them");
                Vec::new()
            }
        };

        let pod_ports = match provider.list_pods().await {
            Ok(items) => inventory::pod_port_entries(&items),
            Err(e) => {
                error!(error = %e, "Failed to list pods, continuing without them");
                Vec::new()
            }
        };

        info!(
            ingress_paths = ingress_paths.len(),
            service_ports = service_ports.len(),
            pod_ports = pod_ports.len(),
            "Built topology index"
        );

        Self::new(ingress_paths, service_ports, pod_ports)
    }

    pub fn ingress_paths(&self) -> &[IngressPathEntry] {
        &self.ingress_paths
    }

    pub fn service_ports(&self) -> &[ServicePortEntry] {
        &self.service_ports
    }

    pub fn pod_ports(&self) -> &[PodPortEntry] {
        &self.pod_ports
    }

    pub fn is_empty(&self) -> bool {
        self.ingress_paths.is_empty() && self.service_ports.is_empty() && self.pod_ports.is_empty()
    }

    /// The single ingress path serving `target`'s host, path and address
    pub fn ingress_for_host(&self, target: &Target) -> Result<&IngressPathEntry, LookupError> {
        let matches: Vec<_> = self
            .ingress_paths
            .iter()
            .filter(|i| {
                i.host == target.host && i.path == target.path && i.ip_address == Some(target.ip)
            })
            .collect();

        exactly_one(matches, Hop::Ingress, || {
            format!("host {}{} at {}", target.host, target.path, target.ip)
        })
    }

    /// The single service port exposed directly on `target`'s host, port and address
    pub fn service_for_host(&self, target: &Target) -> Result<&ServicePortEntry, LookupError> {
        let matches: Vec<_> = self
            .service_ports
            .iter()
            .filter(|s| {
                s.external_hostname == target.host
                    && s.source_port.number == i32::from(target.port)
                    && s.external_ip == Some(target.ip)
            })
            .collect();

        exactly_one(matches, Hop::Service, || {
            format!("host {}:{} at {}", target.host, target.port, target.ip)
        })
    }

    /// The single service port an ingress path routes to
    pub fn service_for_ingress(
        &self,
        ingress: &IngressPathEntry,
    ) -> Result<&ServicePortEntry, LookupError> {
        let matches: Vec<_> = self
            .service_ports
            .iter()
            .filter(|s| ingress_routes_to(ingress, s))
            .collect();

        exactly_one(matches, Hop::Service, || {
            format!(
                "ingress {}/{} backend {}:{}",
                ingress.namespace,
                ingress.ingress_name,
                ingress.backend_service_name,
                ingress.backend_service_port
            )
        })
    }

    /// Every pod port a service port selects. Many is fine, none is not.
    pub fn pods_for_service(
        &self,
        service: &ServicePortEntry,
    ) -> Result<Vec<&PodPortEntry>, LookupError> {
        let matches: Vec<_> = self
            .pod_ports
            .iter()
            .filter(|p| service_selects(service, p))
            .collect();

        debug!(
            service = %service.service_name,
            namespace = %service.namespace,
            matched = matches.len(),
            "Matched pods for service"
        );

        if matches.is_empty() {
            return Err(LookupError::NotFound {
                hop: Hop::Pod,
                subject: format!(
                    "service {}/{} target port {}",
                    service.namespace, service.service_name, service.target_port
                ),
            });
        }
        Ok(matches)
    }

    /// The single service port selecting a pod port
    pub fn service_for_pod(&self, pod: &PodPortEntry) -> Result<&ServicePortEntry, LookupError> {
        let matches: Vec<_> = self
            .service_ports
            .iter()
            .filter(|s| service_selects(s, pod))
            .collect();

        exactly_one(matches, Hop::Service, || {
            format!(
                "pod {}/{} port {}",
                pod.namespace, pod.pod_name, pod.container_port
            )
        })
    }

    /// The single ingress path routing to a service port
    pub fn ingress_for_service(
        &self,
        service: &ServicePortEntry,
    ) -> Result<&IngressPathEntry, LookupError> {
        let matches: Vec<_> = self
            .ingress_paths
            .iter()
            .filter(|i| ingress_routes_to(i, service))
            .collect();

        exactly_one(matches, Hop::Ingress, || {
            format!(
                "service {}/{} port {}",
                service.namespace, service.service_name, service.source_port
            )
        })
    }
}

fn ingress_routes_to(ingress: &IngressPathEntry, service: &ServicePortEntry) -> bool {
    ingress.namespace == service.namespace
        && ingress.backend_service_name == service.service_name
        && ingress.backend_service_port.matches(&service.source_port)
}

fn service_selects(service: &ServicePortEntry, pod: &PodPortEntry) -> bool {
    service.namespace == pod.namespace
        && service.app_selector.is_some()
        && service.app_selector == pod.app_label
        && service.target_port.matches(&pod.container_port)
}

fn exactly_one<'a, T>(
    mut matches: Vec<&'a T>,
    hop: Hop,
    subject: impl FnOnce() -> String,
) -> Result<&'a T, LookupError> {
    match matches.len() {
        0 => Err(LookupError::NotFound {
            hop,
            subject: subject(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(LookupError::Ambiguous {
            hop,
            subject: subject(),
            count,
        }),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-built entries shared by the topology, route and check tests

    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    pub const LB_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));

    pub fn target(host: &str, path: &str, port: u16) -> Target {
        Target {
            host: host.to_string(),
            path: path.to_string(),
            port,
            ip: LB_IP,
        }
    }

    pub fn ingress(name: &str, host: &str, path: &str, service: &str, port: PortRef) -> IngressPathEntry {
        IngressPathEntry {
            host: host.to_string(),
            path: path.to_string(),
            ip_address: Some(LB_IP),
            namespace: "default".to_string(),
            ingress_name: name.to_string(),
            backend_service_name: service.to_string(),
            backend_service_port: port,
        }
    }

    pub fn service(name: &str, source_port: NamedPort, target_port: PortRef) -> ServicePortEntry {
        ServicePortEntry {
            service_name: name.to_string(),
            namespace: "default".to_string(),
            service_type: "ClusterIP".to_string(),
            cluster_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10))),
            external_ip: None,
            external_hostname: String::new(),
            app_selector: Some(name.to_string()),
            source_port,
            target_port,
            node_port: None,
        }
    }

    pub fn pod(name: &str, app: &str, port: NamedPort, phase: &str) -> PodPortEntry {
        PodPortEntry {
            pod_name: name.to_string(),
            namespace: "default".to_string(),
            app_label: Some(app.to_string()),
            container_name: "app".to_string(),
            container_image: "nginx:1.27".to_string(),
            container_port: port,
            protocol: "TCP".to_string(),
            host_ip: None,
            pod_phase: phase.to_string(),
        }
    }

    /// example.com/ -> ingress web -> service web:80 -> pod web-0:8080
    pub fn web_topology(phase: &str) -> TopologyIndex {
        TopologyIndex::new(
            vec![ingress("web", "example.com", "/", "web", PortRef::Number(80))],
            vec![service("web", NamedPort::new(80), PortRef::Number(8080))],
            vec![pod("web-0", "web", NamedPort::new(8080), phase)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::{Pod, Service};
    use k8s_openapi::api::networking::v1::Ingress;

    #[test]
    fn test_ingress_for_host_exact_match() {
        let index = web_topology("Running");
        let found = index.ingress_for_host(&target("example.com", "/", 80)).unwrap();
        assert_eq!(found.ingress_name, "web");
    }

    #[test]
    fn test_ingress_for_host_is_case_sensitive_on_path() {
        let index = web_topology("Running");
        let err = index
            .ingress_for_host(&target("example.com", "/API", 80))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.hop(), Hop::Ingress);
    }

    #[test]
    fn test_ingress_for_host_requires_matching_ip() {
        let index = web_topology("Running");
        let mut t = target("example.com", "/", 80);
        t.ip = "5.6.7.8".parse().unwrap();
        assert!(index.ingress_for_host(&t).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ingress_for_host_ambiguous() {
        let index = TopologyIndex::new(
            vec![
                ingress("a", "example.com", "/", "web", PortRef::Number(80)),
                ingress("b", "example.com", "/", "web", PortRef::Number(80)),
            ],
            vec![],
            vec![],
        );
        let err = index
            .ingress_for_host(&target("example.com", "/", 80))
            .unwrap_err();
        assert!(matches!(err, LookupError::Ambiguous { count: 2, .. }));
    }

    #[test]
    fn test_service_for_host() {
        let mut lb = service("edge", NamedPort::new(443), PortRef::Number(8443));
        lb.external_hostname = "edge.example.com".to_string();
        lb.external_ip = Some(LB_IP);
        let index = TopologyIndex::new(vec![], vec![lb], vec![]);

        let found = index
            .service_for_host(&target("edge.example.com", "/", 443))
            .unwrap();
        assert_eq!(found.service_name, "edge");

        let err = index
            .service_for_host(&target("edge.example.com", "/", 80))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_service_for_ingress_by_name_ignores_number() {
        let index = TopologyIndex::new(
            vec![],
            vec![service("web", NamedPort::named(8000, "http"), PortRef::Number(8080))],
            vec![],
        );
        let ing = ingress("web", "example.com", "/", "web", PortRef::Name("http".to_string()));
        let found = index.service_for_ingress(&ing).unwrap();
        assert_eq!(found.source_port.number, 8000);
    }

    #[test]
    fn test_service_for_ingress_by_number_ignores_name() {
        let index = TopologyIndex::new(
            vec![],
            vec![service("web", NamedPort::named(80, "http"), PortRef::Number(8080))],
            vec![],
        );
        let ing = ingress("web", "example.com", "/", "web", PortRef::Number(80));
        assert!(index.service_for_ingress(&ing).is_ok());
    }

    #[test]
    fn test_service_for_ingress_wrong_namespace() {
        let mut svc = service("web", NamedPort::new(80), PortRef::Number(8080));
        svc.namespace = "other".to_string();
        let index = TopologyIndex::new(vec![], vec![svc], vec![]);
        let ing = ingress("web", "example.com", "/", "web", PortRef::Number(80));
        assert!(index.service_for_ingress(&ing).unwrap_err().is_not_found());
    }

    #[test]
    fn test_pods_for_service_returns_all_matches() {
        let index = TopologyIndex::new(
            vec![],
            vec![service("web", NamedPort::new(80), PortRef::Number(8080))],
            vec![
                pod("web-0", "web", NamedPort::new(8080), "Running"),
                pod("web-1", "web", NamedPort::new(8080), "Running"),
                pod("db-0", "db", NamedPort::new(8080), "Running"),
                pod("web-2", "web", NamedPort::new(9090), "Running"),
            ],
        );
        let pods = index.pods_for_service(&index.service_ports()[0]).unwrap();
        let names: Vec<_> = pods.iter().map(|p| p.pod_name.as_str()).collect();
        assert_eq!(names, vec!["web-0", "web-1"]);
    }

    #[test]
    fn test_pods_for_service_by_port_name() {
        let index = TopologyIndex::new(
            vec![],
            vec![service("web", NamedPort::new(80), PortRef::Name("http".to_string()))],
            vec![pod("web-0", "web", NamedPort::named(3000, "http"), "Running")],
        );
        assert_eq!(index.pods_for_service(&index.service_ports()[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_pods_for_service_without_selector_matches_nothing() {
        let mut svc = service("web", NamedPort::new(80), PortRef::Number(8080));
        svc.app_selector = None;
        let mut unlabeled = pod("web-0", "web", NamedPort::new(8080), "Running");
        unlabeled.app_label = None;
        let index = TopologyIndex::new(vec![], vec![svc], vec![unlabeled]);
        let err = index.pods_for_service(&index.service_ports()[0]).unwrap_err();
        assert_eq!(err.hop(), Hop::Pod);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_inverse_queries() {
        let index = web_topology("Running");
        let pod = &index.pod_ports()[0];
        let svc = index.service_for_pod(pod).unwrap();
        assert_eq!(svc.service_name, "web");
        let ing = index.ingress_for_service(svc).unwrap();
        assert_eq!(ing.ingress_name, "web");
    }

    #[test]
    fn test_service_for_pod_ambiguous() {
        let mut second = service("web", NamedPort::new(81), PortRef::Number(8080));
        second.service_name = "web-alt".to_string();
        second.app_selector = Some("web".to_string());
        let index = TopologyIndex::new(
            vec![],
            vec![service("web", NamedPort::new(80), PortRef::Number(8080)), second],
            vec![pod("web-0", "web", NamedPort::new(8080), "Running")],
        );
        let err = index.service_for_pod(&index.pod_ports()[0]).unwrap_err();
        assert!(err.is_ambiguous());
    }

    struct FailingServices;

    #[async_trait]
    impl InventoryProvider for FailingServices {
        async fn list_ingresses(&self) -> anyhow::Result<Vec<Ingress>> {
            Ok(vec![])
        }

        async fn list_services(&self) -> anyhow::Result<Vec<Service>> {
            Err(anyhow::anyhow!("forbidden"))
        }

        async fn list_pods(&self) -> anyhow::Result<Vec<Pod>> {
            let pod: Pod = serde_json::from_value(serde_json::json!({
                "metadata": {"name": "web-0", "namespace": "default", "labels": {"app": "web"}},
                "spec": {"containers": [{"name": "app", "ports": [{"containerPort": 8080}]}]},
                "status": {"phase": "Running"}
            }))
            .unwrap();
            Ok(vec![pod])
        }
    }

    #[tokio::test]
    async fn test_load_treats_provider_error_as_empty() {
        let index = TopologyIndex::load(&FailingServices).await;
        assert!(index.service_ports().is_empty());
        assert!(index.ingress_paths().is_empty());
        assert_eq!(index.pod_ports().len(), 1);
        assert!(!index.is_empty());
    }
}
