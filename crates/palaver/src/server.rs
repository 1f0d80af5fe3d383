//! Gateway Server
//!
//! Owns the shared gateway state and a set of transport adapters, and
//! coordinates their lifecycle. Adapters run as independent tokio
//! tasks; `start` returns once every adapter has signalled readiness
//! (or failed trying), and `stop` fires one shared cancellation token
//! and waits for every task to finish. Both phases are partial-failure
//! tolerant: one misbehaving adapter never blocks the rest.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::transport::{GatewayContext, Transport};

/// Outcome of a start or stop phase, per adapter.
#[derive(Debug, Default)]
pub struct LifecycleReport {
    pub succeeded: Vec<&'static str>,
    pub failed: Vec<(&'static str, GatewayError)>,
}

impl LifecycleReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

struct RunningTransport {
    name: &'static str,
    handle: JoinHandle<Result<(), GatewayError>>,
}

/// Multi-transport gateway server.
pub struct GatewayServer {
    ctx: GatewayContext,
    cancel: CancellationToken,
    pending: Vec<Box<dyn Transport>>,
    running: Vec<RunningTransport>,
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer")
            .field("pending", &self.pending.len())
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}

impl GatewayServer {
    /// Create a server over the given context and adapters. At least
    /// one adapter is required.
    pub fn new(
        ctx: GatewayContext,
        transports: Vec<Box<dyn Transport>>,
    ) -> Result<Self, GatewayError> {
        if transports.is_empty() {
            return Err(GatewayError::Configuration(
                "at least one transport adapter is required".into(),
            ));
        }
        Ok(Self {
            ctx,
            cancel: CancellationToken::new(),
            pending: transports,
            running: Vec::new(),
        })
    }

    /// Shared state, for registering providers and resources.
    pub fn context(&self) -> &GatewayContext {
        &self.ctx
    }

    /// Launch every pending adapter and wait until each is either
    /// accepting traffic or has failed to start.
    pub async fn start(&mut self) -> LifecycleReport {
        let mut report = LifecycleReport::default();

        for transport in self.pending.drain(..) {
            let name = transport.name();
            let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
            let ctx = self.ctx.clone();
            let cancel = self.cancel.clone();
            let handle =
                tokio::spawn(async move { transport.run(ctx, cancel, ready_tx).await });

            match ready_rx.await {
                Ok(()) => {
                    tracing::info!(transport = name, "Transport started");
                    report.succeeded.push(name);
                    self.running.push(RunningTransport { name, handle });
                }
                // The adapter dropped its ready signal, so its task has
                // already ended; collect the error it ended with.
                Err(_) => {
                    let error = match handle.await {
                        Ok(Ok(())) => GatewayError::Execution(
                            "transport exited before becoming ready".into(),
                        ),
                        Ok(Err(e)) => e,
                        Err(join) => GatewayError::Execution(format!(
                            "transport task panicked: {}",
                            join
                        )),
                    };
                    tracing::error!(transport = name, error = %error, "Transport failed to start");
                    report.failed.push((name, error));
                }
            }
        }

        report
    }

    /// Request shutdown and wait for every running adapter to finish.
    /// Idempotent; a second call returns an empty report.
    pub async fn stop(&mut self) -> LifecycleReport {
        self.cancel.cancel();

        let mut report = LifecycleReport::default();
        for running in self.running.drain(..) {
            match running.handle.await {
                Ok(Ok(())) => {
                    tracing::info!(transport = running.name, "Transport stopped");
                    report.succeeded.push(running.name);
                }
                Ok(Err(e)) => {
                    tracing::error!(transport = running.name, error = %e, "Transport shutdown failed");
                    report.failed.push((running.name, e));
                }
                Err(join) => {
                    let error =
                        GatewayError::Execution(format!("transport task panicked: {}", join));
                    tracing::error!(transport = running.name, error = %error, "Transport shutdown failed");
                    report.failed.push((running.name, error));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::VersionNegotiator;
    use crate::transport::ReadySignal;
    use async_trait::async_trait;

    fn test_ctx() -> GatewayContext {
        GatewayContext::new(VersionNegotiator::new(["0.9.0".to_string()], None).unwrap())
    }

    /// Signals ready, idles until shutdown, then ends as configured.
    struct FakeTransport {
        name: &'static str,
        fail_on_stop: bool,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(
            self: Box<Self>,
            _ctx: GatewayContext,
            cancel: CancellationToken,
            ready: ReadySignal,
        ) -> Result<(), GatewayError> {
            let _ = ready.send(());
            cancel.cancelled().await;
            if self.fail_on_stop {
                Err(GatewayError::Execution("shutdown hook failed".into()))
            } else {
                Ok(())
            }
        }
    }

    /// Drops its ready signal and bails out immediately.
    struct BrokenTransport;

    #[async_trait]
    impl Transport for BrokenTransport {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn run(
            self: Box<Self>,
            _ctx: GatewayContext,
            _cancel: CancellationToken,
            ready: ReadySignal,
        ) -> Result<(), GatewayError> {
            drop(ready);
            Err(GatewayError::Transport(std::io::Error::other("bind failed")))
        }
    }

    #[test]
    fn test_zero_transports_is_configuration_error() {
        let err = GatewayServer::new(test_ctx(), Vec::new()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_start_and_stop_two_transports() {
        let mut server = GatewayServer::new(
            test_ctx(),
            vec![
                Box::new(FakeTransport { name: "a", fail_on_stop: false }),
                Box::new(FakeTransport { name: "b", fail_on_stop: false }),
            ],
        )
        .unwrap();

        let started = server.start().await;
        assert_eq!(started.succeeded, vec!["a", "b"]);
        assert!(started.all_ok());

        let stopped = server.stop().await;
        assert_eq!(stopped.succeeded, vec!["a", "b"]);
        assert!(stopped.all_ok());
    }

    #[tokio::test]
    async fn test_stop_survives_failing_shutdown_hook() {
        let mut server = GatewayServer::new(
            test_ctx(),
            vec![
                Box::new(FakeTransport { name: "flaky", fail_on_stop: true }),
                Box::new(FakeTransport { name: "steady", fail_on_stop: false }),
            ],
        )
        .unwrap();

        server.start().await;
        let stopped = server.stop().await;

        assert_eq!(stopped.succeeded, vec!["steady"]);
        assert_eq!(stopped.failed.len(), 1);
        assert_eq!(stopped.failed[0].0, "flaky");
    }

    #[tokio::test]
    async fn test_failed_start_does_not_block_others() {
        let mut server = GatewayServer::new(
            test_ctx(),
            vec![
                Box::new(BrokenTransport),
                Box::new(FakeTransport { name: "ok", fail_on_stop: false }),
            ],
        )
        .unwrap();

        let started = server.start().await;
        assert_eq!(started.succeeded, vec!["ok"]);
        assert_eq!(started.failed.len(), 1);
        assert_eq!(started.failed[0].0, "broken");

        let stopped = server.stop().await;
        assert_eq!(stopped.succeeded, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut server = GatewayServer::new(
            test_ctx(),
            vec![Box::new(FakeTransport { name: "a", fail_on_stop: false })],
        )
        .unwrap();

        server.start().await;
        let first = server.stop().await;
        assert_eq!(first.succeeded, vec!["a"]);

        let second = server.stop().await;
        assert!(second.succeeded.is_empty());
        assert!(second.all_ok());
    }
}
