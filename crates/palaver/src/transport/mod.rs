//! Transport Adapters
//!
//! Each adapter translates its channel's envelopes into canonical
//! discover/execute/fetch calls against the shared registry and
//! router, and serializes results back. Adapters run as independent
//! tokio tasks owned by the [`GatewayServer`](crate::server::GatewayServer)
//! and stop when the shared cancellation token fires.
//!
//! Failure policy: connection-level errors terminate only that
//! connection's loop; handler errors become structured error envelopes;
//! nothing short of a configuration error brings an adapter down.

pub mod http;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod stdio;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::negotiate::VersionNegotiator;
use crate::registry::CapabilityRegistry;
use crate::resources::ResourceRouter;
use crate::sampling::SamplingController;
use crate::session::SessionTracker;

/// Shared state handed to every transport. All components are injected
/// here; there is no global registry.
#[derive(Clone)]
pub struct GatewayContext {
    pub negotiator: Arc<VersionNegotiator>,
    pub registry: Arc<CapabilityRegistry>,
    pub router: Arc<ResourceRouter>,
    pub sampling: Arc<SamplingController>,
    pub sessions: Arc<SessionTracker>,
}

impl GatewayContext {
    /// Context with the given negotiator and fresh empty components.
    pub fn new(negotiator: VersionNegotiator) -> Self {
        Self {
            negotiator: Arc::new(negotiator),
            registry: Arc::new(CapabilityRegistry::new()),
            router: Arc::new(ResourceRouter::new()),
            sampling: Arc::new(SamplingController::new()),
            sessions: Arc::new(SessionTracker::new()),
        }
    }
}

/// Fired by a transport once it is accepting traffic.
pub type ReadySignal = tokio::sync::oneshot::Sender<()>;

/// A concurrently running transport adapter.
///
/// `run` blocks until the cancellation token fires or the channel is
/// exhausted, signalling `ready` as soon as the adapter can accept
/// traffic. Dropping `ready` without sending counts as a failed start.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(
        self: Box<Self>,
        ctx: GatewayContext,
        cancel: CancellationToken,
        ready: ReadySignal,
    ) -> Result<(), GatewayError>;
}
