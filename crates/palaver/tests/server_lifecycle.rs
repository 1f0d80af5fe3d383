//! Lifecycle tests driving a full server over an in-memory transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio_util::sync::CancellationToken;

use palaver::negotiate::VersionNegotiator;
use palaver::registry::Tool;
use palaver::server::GatewayServer;
use palaver::transport::stdio::serve_lines;
use palaver::transport::{GatewayContext, ReadySignal, Transport};
use palaver::GatewayError;

/// Line transport over one end of an in-memory pipe.
struct LoopbackTransport {
    io: DuplexStream,
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn name(&self) -> &'static str {
        "loopback"
    }

    async fn run(
        self: Box<Self>,
        ctx: GatewayContext,
        cancel: CancellationToken,
        ready: ReadySignal,
    ) -> Result<(), GatewayError> {
        let (read, write) = tokio::io::split(self.io);
        let _ = ready.send(());
        serve_lines(BufReader::new(read), write, &ctx, cancel).await
    }
}

fn echo_ctx() -> GatewayContext {
    let negotiator = VersionNegotiator::new(["1.0.0".to_string()], None).unwrap();
    let ctx = GatewayContext::new(negotiator);
    ctx.registry.register_tool(Tool::new(
        "echo",
        "echoes input",
        Arc::new(|params: Value| async move { Ok::<_, GatewayError>(params) }),
    ));
    ctx
}

#[tokio::test]
async fn test_server_serves_until_stopped() -> anyhow::Result<()> {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let ctx = echo_ctx();
    let mut server = GatewayServer::new(
        ctx.clone(),
        vec![Box::new(LoopbackTransport { io: server_io })],
    )?;

    let started = server.start().await;
    assert_eq!(started.succeeded, vec!["loopback"]);
    assert!(started.all_ok());

    let (client_read, mut client_write) = tokio::io::split(client_io);
    let mut lines = BufReader::new(client_read).lines();

    let banner: Value = serde_json::from_str(&lines.next_line().await?.unwrap())?;
    assert_eq!(banner["status"], "ready");

    client_write
        .write_all(b"{\"command\":\"execute\",\"tool\":\"echo\",\"parameters\":{\"x\":1}}\n")
        .await?;
    let response: Value = serde_json::from_str(&lines.next_line().await?.unwrap())?;
    assert_eq!(response, json!({ "result": { "x": 1 } }));

    let stopped = server.stop().await;
    assert_eq!(stopped.succeeded, vec!["loopback"]);
    assert!(ctx.sessions.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_two_transports_share_one_registry() -> anyhow::Result<()> {
    let (client_a, server_a) = tokio::io::duplex(4096);
    let (client_b, server_b) = tokio::io::duplex(4096);
    let ctx = echo_ctx();
    let mut server = GatewayServer::new(
        ctx.clone(),
        vec![
            Box::new(LoopbackTransport { io: server_a }),
            Box::new(LoopbackTransport { io: server_b }),
        ],
    )?;
    server.start().await;

    // A tool registered after startup is visible on both channels.
    ctx.registry.register_tool(Tool::new(
        "late",
        "registered after start",
        Arc::new(|p: Value| async move { Ok::<_, GatewayError>(p) }),
    ));

    for client_io in [client_a, client_b] {
        let (read, mut write) = tokio::io::split(client_io);
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await?; // banner

        write.write_all(b"{\"command\":\"discovery\"}\n").await?;
        let discovery: Value = serde_json::from_str(&lines.next_line().await?.unwrap())?;
        let names: Vec<&str> = discovery["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["echo", "late"]);
    }

    let stopped = server.stop().await;
    assert!(stopped.all_ok());
    Ok(())
}
