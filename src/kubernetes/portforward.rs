// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Tunnels through the API server's pod port-forward subresource

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::probe::{Tunnel, TunnelProvider, wait_ready};
use crate::topology::PodPortEntry;

/// Opens one port-forward per tunnel, bound to an ephemeral local port
pub struct PortForwardTunnels {
    client: Client,
    ready_timeout: Option<Duration>,
}

impl PortForwardTunnels {
    pub fn new(client: Client, ready_timeout: Option<Duration>) -> Self {
        Self {
            client,
            ready_timeout,
        }
    }
}

#[async_trait]
impl TunnelProvider for PortForwardTunnels {
    async fn open(&self, pod: &PodPortEntry) -> Result<Tunnel, ProbeError> {
        let setup_error = |reason: String| ProbeError::Setup {
            pod: pod.pod_name.clone(),
            port: pod.container_port.number,
            reason,
        };

        let remote_port = u16::try_from(pod.container_port.number)
            .map_err(|_| setup_error(format!("invalid port {}", pod.container_port.number)))?;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| setup_error(format!("failed to bind local port: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| setup_error(format!("failed to read local address: {}", e)))?;

        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        debug!(
            pod = %pod.pod_name,
            namespace = %pod.namespace,
            remote_port,
            local_addr = %local_addr,
            "Opening tunnel"
        );

        let task = tokio::spawn(forward(
            api,
            pod.pod_name.clone(),
            remote_port,
            listener,
            ready_tx,
            shutdown_rx,
        ));
        // Dropping the handle on an error path aborts the task
        let tunnel = Tunnel::new(local_addr, shutdown_tx, task);

        wait_ready(ready_rx, self.ready_timeout, pod).await?;
        Ok(tunnel)
    }
}

/// Background half of a tunnel: establish the port-forward, report readiness,
/// then pipe a single local connection to the pod until shut down
async fn forward(
    api: Api<Pod>,
    pod_name: String,
    remote_port: u16,
    listener: TcpListener,
    ready: oneshot::Sender<Result<(), String>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut forwarder = match api.portforward(&pod_name, &[remote_port]).await {
        Ok(forwarder) => forwarder,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    let Some(mut upstream) = forwarder.take_stream(remote_port) else {
        let _ = ready.send(Err(format!("no stream for port {}", remote_port)));
        forwarder.abort();
        return;
    };

    if ready.send(Ok(())).is_err() {
        // Caller gave up waiting
        forwarder.abort();
        return;
    }

    tokio::select! {
        _ = &mut shutdown => {}
        accepted = listener.accept() => match accepted {
            Ok((mut conn, peer)) => {
                debug!(pod = %pod_name, peer = %peer, "Forwarding connection");
                tokio::select! {
                    _ = &mut shutdown => {}
                    copied = tokio::io::copy_bidirectional(&mut conn, &mut upstream) => {
                        if let Err(e) = copied {
                            debug!(pod = %pod_name, error = %e, "Forwarded connection ended with error");
                        }
                    }
                }
            }
            Err(e) => warn!(pod = %pod_name, error = %e, "Failed to accept tunnel connection"),
        }
    }

    drop(upstream);
    forwarder.abort();
    debug!(pod = %pod_name, remote_port, "Port-forward stopped");
}
