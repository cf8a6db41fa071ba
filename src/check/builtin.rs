// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

use super::{Check, CheckContext, CheckOutcome};
use crate::probe::{PodProber, ProbeOutcome};
use crate::route;

/// Resolve the route; without one nothing else can be checked
pub struct RouteExistsCheck;

#[async_trait]
impl Check for RouteExistsCheck {
    fn name(&self) -> &str {
        "route-exists"
    }

    async fn run(&self, ctx: &mut CheckContext<'_>) -> CheckOutcome {
        match route::resolve(ctx.target, ctx.topology) {
            Ok(resolved) => {
                ctx.route = Some(resolved);
                CheckOutcome::Passed
            }
            Err(e) => CheckOutcome::Halt(e.to_string()),
        }
    }
}

/// Every pod on the route must be in phase Running
pub struct PodStatusCheck;

#[async_trait]
impl Check for PodStatusCheck {
    fn name(&self) -> &str {
        "pod-status"
    }

    async fn run(&self, ctx: &mut CheckContext<'_>) -> CheckOutcome {
        let pods = ctx.pods();
        if pods.is_empty() {
            error!("No pods were found");
            return CheckOutcome::Failed("no pods were found".to_string());
        }

        let not_running: Vec<String> = pods
            .iter()
            .filter(|p| !p.is_running())
            .map(|p| {
                let phase = if p.pod_phase.is_empty() {
                    "Unknown"
                } else {
                    p.pod_phase.as_str()
                };
                format!("{}/{} ({})", p.namespace, p.pod_name, phase)
            })
            .collect();

        if not_running.is_empty() {
            CheckOutcome::Passed
        } else {
            warn!(pods = ?not_running, "Not all pods have a status of Running");
            CheckOutcome::Failed(format!("pods not Running: {}", not_running.join(", ")))
        }
    }
}

/// Probe every pod on the route through its own tunnel, one at a time
pub struct PodListeningCheck {
    prober: Arc<dyn PodProber>,
}

impl PodListeningCheck {
    pub fn new(prober: Arc<dyn PodProber>) -> Self {
        Self { prober }
    }
}

#[async_trait]
impl Check for PodListeningCheck {
    fn name(&self) -> &str {
        "pod-listening"
    }

    async fn run(&self, ctx: &mut CheckContext<'_>) -> CheckOutcome {
        let pods = ctx.pods();
        if pods.is_empty() {
            error!("No pods were found");
            return CheckOutcome::Failed("no pods were found".to_string());
        }

        let mut unhealthy = Vec::new();
        for pod in pods {
            match self.prober.probe(pod).await {
                Ok(ProbeOutcome::Healthy) => {}
                Ok(ProbeOutcome::Unhealthy { status }) => {
                    unhealthy.push(format!(
                        "{}/{}:{} returned HTTP {}",
                        pod.namespace, pod.pod_name, pod.container_port.number, status
                    ));
                }
                Err(e) => {
                    error!(pod = %pod.pod_name, error = %e, "Error connecting to port");
                    return CheckOutcome::Abort(e.to_string());
                }
            }
        }

        if unhealthy.is_empty() {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed(unhealthy.join(", "))
        }
    }
}
