// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::topology::PodPortEntry;

/// Opens a local forwarding channel to a pod's container port
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Returns only once the tunnel is ready to accept a connection
    async fn open(&self, pod: &PodPortEntry) -> Result<Tunnel, ProbeError>;
}

/// A ready tunnel. Forwarding runs in a background task that is stopped by
/// [`Tunnel::close`], or aborted when the handle is dropped.
pub struct Tunnel {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Tunnel {
    pub fn new(local_addr: SocketAddr, shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            local_addr,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the forwarding task to stop and wait for it to finish
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            warn!(local_addr = %self.local_addr, error = %e, "Tunnel task failed");
        }
        debug!(local_addr = %self.local_addr, "Tunnel closed");
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Block until the forwarding task reports ready or a setup error
///
/// `timeout` of `None` waits for as long as the task takes.
pub async fn wait_ready(
    ready: oneshot::Receiver<Result<(), String>>,
    timeout: Option<Duration>,
    pod: &PodPortEntry,
) -> Result<(), ProbeError> {
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, ready).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(ProbeError::NotReady {
                    pod: pod.pod_name.clone(),
                    port: pod.container_port.number,
                    waited_secs: limit.as_secs(),
                });
            }
        },
        None => ready.await,
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(ProbeError::Setup {
            pod: pod.pod_name.clone(),
            port: pod.container_port.number,
            reason,
        }),
        Err(_) => Err(ProbeError::Setup {
            pod: pod.pod_name.clone(),
            port: pod.container_port.number,
            reason: "forwarding task exited before reporting readiness".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::fixtures::pod;
    use crate::topology::NamedPort;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn web_pod() -> PodPortEntry {
        pod("web-0", "web", NamedPort::new(8080), "Running")
    }

    #[tokio::test]
    async fn test_wait_ready_ok() {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(())).unwrap();
        assert!(wait_ready(rx, None, &web_pod()).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_ready_setup_error() {
        let (tx, rx) = oneshot::channel();
        tx.send(Err("pod not found".to_string())).unwrap();
        let err = wait_ready(rx, Some(Duration::from_secs(1)), &web_pod())
            .await
            .unwrap_err();
        match err {
            ProbeError::Setup { pod, port, reason } => {
                assert_eq!(pod, "web-0");
                assert_eq!(port, 8080);
                assert_eq!(reason, "pod not found");
            }
            other => panic!("Expected Setup error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_ready_sender_dropped() {
        let (tx, rx) = oneshot::channel::<Result<(), String>>();
        drop(tx);
        let err = wait_ready(rx, None, &web_pod()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Setup { .. }));
    }

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let (_tx, rx) = oneshot::channel::<Result<(), String>>();
        let err = wait_ready(rx, Some(Duration::from_millis(20)), &web_pod())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::NotReady { .. }));
    }

    #[tokio::test]
    async fn test_close_stops_task() {
        let stopped = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let flag = Arc::clone(&stopped);
        let task = tokio::spawn(async move {
            let _ = shutdown_rx.await;
            flag.store(true, Ordering::SeqCst);
        });

        let tunnel = Tunnel::new("127.0.0.1:1".parse().unwrap(), shutdown_tx, task);
        tunnel.close().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();

        let tunnel = Tunnel::new("127.0.0.1:1".parse().unwrap(), shutdown_tx, task);
        drop(tunnel);
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }
}
