//! Framed RPC Transport
//!
//! Length-prefixed JSON envelopes over TCP, carrying the same
//! discovery/execute commands as the line transport. One framed
//! connection maps to one session; a broken frame ends that
//! connection only. Compiled in behind the `rpc` feature.

use std::net::SocketAddr;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use super::stdio::handle_envelope;
use super::{GatewayContext, ReadySignal, Transport};
use crate::error::GatewayError;
use crate::session::TransportKind;

/// Transport accepting framed connections on one socket.
#[derive(Debug)]
pub struct RpcTransport {
    addr: SocketAddr,
}

impl RpcTransport {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait::async_trait]
impl Transport for RpcTransport {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn run(
        self: Box<Self>,
        ctx: GatewayContext,
        cancel: CancellationToken,
        ready: ReadySignal,
    ) -> Result<(), GatewayError> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "RPC transport listening");
        let _ = ready.send(());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("RPC transport shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(peer = %peer, "RPC connection accepted");
                        let ctx = ctx.clone();
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            serve_framed(stream, &ctx, cancel).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "RPC accept failed");
                    }
                }
            }
        }
    }
}

/// Serve one framed connection until it closes or shutdown fires.
pub async fn serve_framed<T>(io: T, ctx: &GatewayContext, cancel: CancellationToken)
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut framed = Framed::new(io, LengthDelimitedCodec::new());
    let session_id = ctx
        .sessions
        .open(ctx.negotiator.default_version(), TransportKind::Rpc);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = framed.next() => match frame {
                Some(Ok(frame)) => {
                    let raw = String::from_utf8_lossy(&frame);
                    let response = handle_envelope(ctx, &raw).await;
                    let payload = match serde_json::to_vec(&response) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unserializable response");
                            continue;
                        }
                    };
                    if let Err(e) = framed.send(Bytes::from(payload)).await {
                        tracing::warn!(error = %e, "RPC write failed, closing connection");
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "RPC frame decode failed, closing connection");
                    break;
                }
                None => break,
            }
        }
    }

    ctx.sessions.close(&session_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::VersionNegotiator;
    use crate::registry::Tool;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn test_ctx() -> GatewayContext {
        let negotiator = VersionNegotiator::new(["0.9.0".to_string()], None).unwrap();
        let ctx = GatewayContext::new(negotiator);
        ctx.registry.register_tool(Tool::new(
            "echo",
            "echoes input",
            Arc::new(|p: Value| async move { Ok::<_, GatewayError>(p) }),
        ));
        ctx
    }

    #[tokio::test]
    async fn test_framed_execute_round_trip() {
        let ctx = test_ctx();
        let cancel = CancellationToken::new();
        let (server_io, client_io) = tokio::io::duplex(4096);

        let server_ctx = ctx.clone();
        let server_cancel = cancel.clone();
        let server = tokio::spawn(async move {
            serve_framed(server_io, &server_ctx, server_cancel).await;
        });

        let mut client = Framed::new(client_io, LengthDelimitedCodec::new());
        client
            .send(Bytes::from(
                r#"{"command":"execute","tool":"echo","parameters":{"x":1}}"#,
            ))
            .await
            .unwrap();

        let frame = client.next().await.unwrap().unwrap();
        let response: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(response, json!({ "result": { "x": 1 } }));

        drop(client);
        server.await.unwrap();
        assert!(ctx.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_framed_malformed_payload_keeps_connection() {
        let ctx = test_ctx();
        let cancel = CancellationToken::new();
        let (server_io, client_io) = tokio::io::duplex(4096);

        let server_ctx = ctx.clone();
        let server_cancel = cancel.clone();
        tokio::spawn(async move {
            serve_framed(server_io, &server_ctx, server_cancel).await;
        });

        let mut client = Framed::new(client_io, LengthDelimitedCodec::new());
        client.send(Bytes::from("{not json")).await.unwrap();

        let frame = client.next().await.unwrap().unwrap();
        let response: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(response["error"], "Invalid JSON");

        // Connection still serves subsequent envelopes.
        client
            .send(Bytes::from(r#"{"command":"discovery"}"#))
            .await
            .unwrap();
        let frame = client.next().await.unwrap().unwrap();
        let response: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(response["tools"][0]["name"], "echo");
    }
}
