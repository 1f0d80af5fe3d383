//! # palaver
//!
//! A multi-transport tool gateway: one capability registry and one
//! resource router, exposed concurrently over HTTP with server-sent
//! events, a line-oriented stdio channel, and (optionally) a framed
//! RPC channel.
//!
//! ## Architecture
//!
//! - [`negotiate`] - protocol version selection between client and server
//! - [`registry`] - named tools with handlers and observer notification
//! - [`resources`] - URI templates routed to resource providers
//! - [`sampling`] - rolling-window tuning of generation parameters
//! - [`session`] - per-connection protocol state
//! - [`provider`] - the seam business logic plugs into
//! - [`transport`] - adapters translating channel envelopes to registry calls
//! - [`server`] - lifecycle coordination across all adapters
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use palaver::negotiate::VersionNegotiator;
//! use palaver::registry::Tool;
//! use palaver::server::GatewayServer;
//! use palaver::transport::{http::HttpTransport, stdio::StdioTransport, GatewayContext};
//!
//! # async fn run() -> Result<(), palaver::error::GatewayError> {
//! let negotiator = VersionNegotiator::new(["1.0.0".to_string()], None)?;
//! let ctx = GatewayContext::new(negotiator);
//! ctx.registry.register_tool(Tool::new(
//!     "echo",
//!     "echoes input",
//!     Arc::new(|params: serde_json::Value| async move {
//!         Ok::<_, palaver::GatewayError>(params)
//!     }),
//! ));
//!
//! let mut server = GatewayServer::new(
//!     ctx,
//!     vec![
//!         Box::new(HttpTransport::new(([127, 0, 0, 1], 8080).into())),
//!         Box::new(StdioTransport::new()),
//!     ],
//! )?;
//! server.start().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod negotiate;
pub mod provider;
pub mod registry;
pub mod resources;
pub mod sampling;
pub mod server;
pub mod session;
pub mod transport;

pub use error::GatewayError;
pub use negotiate::{VersionNegotiator, NEGOTIATED_HEADER, VERSIONS_HEADER};
pub use provider::{register_provider, CapabilityProvider, CapabilitySpec, ExecutionOutput};
pub use registry::{CapabilityRegistry, RegistryObserver, Tool, ToolDescriptor, ToolSchema};
pub use resources::{Method, ResourceProvider, ResourceRouter, UriTemplate};
pub use sampling::{ProfileBounds, SamplingController, SamplingStats, TunedParams};
pub use server::{GatewayServer, LifecycleReport};
pub use session::{ProtocolSession, SessionTracker, TransportKind};
pub use transport::{GatewayContext, Transport};
