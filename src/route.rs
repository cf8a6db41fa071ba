// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Route resolution: Ingress -> Service -> Pods for a target
//!
//! Linear, no backtracking. An Ingress match takes precedence; only when no
//! Ingress serves the target is the Service matched directly against the host.

use serde::Serialize;
use tracing::{debug, error};

use crate::error::ResolveError;
use crate::target::Target;
use crate::topology::{IngressPathEntry, PodPortEntry, ServicePortEntry, TopologyIndex};

/// The chain traffic to a target would take
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRoute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressPathEntry>,
    pub service: ServicePortEntry,
    /// Never empty
    pub pods: Vec<PodPortEntry>,
}

pub fn resolve(target: &Target, topology: &TopologyIndex) -> Result<ResolvedRoute, ResolveError> {
    let result = resolve_inner(target, topology);
    if let Err(ref e) = result {
        error!(
            host = %target.host,
            path = %target.path,
            port = target.port,
            ip = %target.ip,
            hop = %e.lookup().hop(),
            error = %e,
            "Route resolution failed"
        );
    }
    result
}

fn resolve_inner(target: &Target, topology: &TopologyIndex) -> Result<ResolvedRoute, ResolveError> {
    let (ingress, service) = match topology.ingress_for_host(target) {
        Ok(ingress) => {
            debug!(ingress = %ingress.ingress_name, namespace = %ingress.namespace, "Matched ingress");
            let service = topology
                .service_for_ingress(ingress)
                .map_err(ResolveError::NoServiceForIngress)?;
            (Some(ingress.clone()), service)
        }
        Err(e) if e.is_not_found() => {
            debug!(host = %target.host, "No ingress for host, trying services");
            let service = topology
                .service_for_host(target)
                .map_err(ResolveError::NoIngressOrService)?;
            (None, service)
        }
        Err(e) => return Err(ResolveError::AmbiguousIngress(e)),
    };
    debug!(service = %service.service_name, namespace = %service.namespace, "Matched service");

    let pods: Vec<PodPortEntry> = topology
        .pods_for_service(service)
        .map_err(ResolveError::NoPodForService)?
        .into_iter()
        .cloned()
        .collect();
    debug!(count = pods.len(), "Matched pods");

    Ok(ResolvedRoute {
        ingress,
        service: service.clone(),
        pods,
    })
}
