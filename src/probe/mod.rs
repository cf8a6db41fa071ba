// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Liveness probe for resolved backend pods
//!
//! Each probe opens its own tunnel to the pod's container port, sends a single
//! HTTP GET through it and closes the tunnel before returning.

mod tunnel;

pub use tunnel::{Tunnel, TunnelProvider, wait_ready};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::topology::PodPortEntry;

/// How a pod answered the probe request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy { status: u16 },
}

/// Anything that can tell whether a pod port is listening
#[async_trait]
pub trait PodProber: Send + Sync {
    async fn probe(&self, pod: &PodPortEntry) -> Result<ProbeOutcome, ProbeError>;
}

/// HTTP probe sent through a tunnel
pub struct LivenessProbe<T> {
    tunnels: T,
    http: reqwest::Client,
    path: String,
}

impl<T: TunnelProvider> LivenessProbe<T> {
    pub fn new(tunnels: T, path: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .no_proxy()
            // 3xx is reported as the pod's status
            .redirect(reqwest::redirect::Policy::none())
            .timeout(request_timeout)
            .build()?;
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Ok(Self {
            tunnels,
            http,
            path,
        })
    }
}

#[async_trait]
impl<T: TunnelProvider> PodProber for LivenessProbe<T> {
    async fn probe(&self, pod: &PodPortEntry) -> Result<ProbeOutcome, ProbeError> {
        let tunnel = self.tunnels.open(pod).await?;
        let url = format!("http://{}{}", tunnel.local_addr(), self.path);
        debug!(pod = %pod.pod_name, port = pod.container_port.number, url = %url, "Sending probe");

        let response = self.http.get(&url).send().await;
        tunnel.close().await;

        let status = response
            .map_err(|source| ProbeError::Transport {
                pod: pod.pod_name.clone(),
                port: pod.container_port.number,
                source,
            })?
            .status();

        if status == StatusCode::OK {
            info!(pod = %pod.pod_name, port = pod.container_port.number, "Pod is listening");
            Ok(ProbeOutcome::Healthy)
        } else {
            warn!(
                pod = %pod.pod_name,
                port = pod.container_port.number,
                status = status.as_u16(),
                "Bad HTTP status code"
            );
            Ok(ProbeOutcome::Unhealthy {
                status: status.as_u16(),
            })
        }
    }
}
