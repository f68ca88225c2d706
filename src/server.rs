use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::database::DocumentStore;

/// Why the server stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    Signal,
    Fatal(String),
}

/// Receives fatal reports from request handling and background tasks.
/// Any report starts an orderly shutdown.
#[derive(Debug, Clone)]
pub struct Supervisor {
    tx: mpsc::UnboundedSender<String>,
}

pub struct FatalSignal {
    rx: mpsc::UnboundedReceiver<String>,
}

impl Supervisor {
    pub fn new() -> (Self, FatalSignal) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, FatalSignal { rx })
    }

    pub fn report_fatal(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Fatal: {}", reason);
        if self.tx.send(reason).is_err() {
            warn!("Fatal report dropped; shutdown already in progress");
        }
    }

    /// Run a background task; an error or panic is reported as fatal
    pub fn spawn<F>(&self, name: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let supervisor = self.clone();
        tokio::spawn(async move {
            match tokio::spawn(task).await {
                Ok(Ok(())) => info!(task = name, "Background task finished"),
                Ok(Err(e)) => supervisor.report_fatal(format!("{} failed: {:#}", name, e)),
                Err(e) => supervisor.report_fatal(format!("{} panicked: {}", name, e)),
            }
        })
    }
}

impl FatalSignal {
    /// Next fatal report; never resolves once every sender is gone
    pub async fn recv(&mut self) -> String {
        match self.rx.recv().await {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

/// Serve until Ctrl+C, SIGTERM or a fatal report, draining in-flight requests
pub async fn serve(listener: TcpListener, app: Router, fatal: FatalSignal) -> std::io::Result<Shutdown> {
    let (cause_tx, cause_rx) = oneshot::channel();

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let cause = shutdown_signal(fatal).await;
            let _ = cause_tx.send(cause);
        })
        .await?;

    Ok(cause_rx.await.unwrap_or(Shutdown::Signal))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(mut fatal: FatalSignal) -> Shutdown {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
            Shutdown::Signal
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
            Shutdown::Signal
        },
        reason = fatal.recv() => {
            error!("Fatal error reported, starting graceful shutdown");
            Shutdown::Fatal(reason)
        },
    }
}

/// Ping the store periodically; give up after `max_failures` misses in a row
pub async fn watch_store(
    store: Arc<dyn DocumentStore>,
    interval: Duration,
    max_failures: u32,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut failures = 0;
    loop {
        ticker.tick().await;
        match store.ping().await {
            Ok(()) => failures = 0,
            Err(e) => {
                failures += 1;
                warn!("Store health check failed ({}/{}): {}", failures, max_failures, e);
                if failures >= max_failures {
                    anyhow::bail!("store unreachable after {} attempts: {}", failures, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_task_is_reported() {
        let (supervisor, mut fatal) = Supervisor::new();
        supervisor
            .spawn("doomed", async { Err(anyhow::anyhow!("boom")) })
            .await
            .unwrap();
        assert_eq!(fatal.recv().await, "doomed failed: boom");
    }

    #[tokio::test]
    async fn panicking_task_is_reported() {
        let (supervisor, mut fatal) = Supervisor::new();
        supervisor
            .spawn("panicky", async {
                if true {
                    panic!("oh no");
                }
                Ok(())
            })
            .await
            .unwrap();
        assert!(fatal.recv().await.starts_with("panicky panicked"));
    }
}
