//! Line-Oriented Transport
//!
//! Reads one JSON envelope per line, writes exactly one JSON line per
//! response, and keeps going until end-of-input or shutdown. Malformed
//! input produces an error envelope, never a dead loop. The loop is
//! generic over its reader and writer so tests can drive it over an
//! in-memory duplex pipe; the server binary wires stdin/stdout.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::{GatewayContext, ReadySignal, Transport};
use crate::error::GatewayError;
use crate::session::TransportKind;

/// Transport over the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    fn name(&self) -> &'static str {
        "stdio"
    }

    async fn run(
        self: Box<Self>,
        ctx: GatewayContext,
        cancel: CancellationToken,
        ready: ReadySignal,
    ) -> Result<(), GatewayError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        let _ = ready.send(());
        serve_lines(stdin, stdout, &ctx, cancel).await?;
        Ok(())
    }
}

/// Run the read/respond loop over an arbitrary line source and sink.
pub async fn serve_lines<R, W>(
    reader: R,
    mut writer: W,
    ctx: &GatewayContext,
    cancel: CancellationToken,
) -> Result<(), GatewayError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_line(
        &mut writer,
        &json!({ "status": "ready", "transport": "stdio" }),
    )
    .await?;

    // No advertisement arrives over this channel, so the session runs
    // at the default version.
    let session_id = ctx
        .sessions
        .open(ctx.negotiator.default_version(), TransportKind::Stdio);

    let mut lines = reader.lines();
    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stdio transport shutting down");
                break Ok(());
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let response = handle_envelope(ctx, &line).await;
                    write_line(&mut writer, &response).await?;
                }
                Ok(None) => {
                    tracing::info!("Stdio input closed, ending loop");
                    break Ok(());
                }
                Err(e) => break Err(GatewayError::Transport(e)),
            }
        }
    };

    ctx.sessions.close(&session_id);
    result
}

/// Dispatch one envelope to the registry. Shared with the RPC
/// transport, which frames the same envelopes differently.
pub(crate) async fn handle_envelope(ctx: &GatewayContext, raw: &str) -> Value {
    let request: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return json!({ "error": "Invalid JSON" }),
    };

    match request.get("command").and_then(Value::as_str) {
        Some("discovery") => {
            json!({ "tools": ctx.registry.descriptors() })
        }
        Some("execute") => {
            let Some(tool_name) = request.get("tool").and_then(Value::as_str) else {
                return json!({ "error": "Tool name not specified" });
            };
            let Some(tool) = ctx.registry.get_tool(tool_name) else {
                return json!({ "error": GatewayError::tool_not_found(tool_name).to_string() });
            };
            let params = request
                .get("parameters")
                .cloned()
                .unwrap_or_else(|| json!({}));

            match tool.execute(params).await {
                Ok(result) => json!({ "result": result }),
                Err(e) => {
                    tracing::warn!(tool = %tool_name, error = %e, "Tool execution failed");
                    json!({ "error": e.to_string() })
                }
            }
        }
        Some(other) => json!({ "error": format!("Unknown command: {}", other) }),
        None => json!({ "error": "Command not specified" }),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &Value,
) -> Result<(), GatewayError> {
    let mut line = serde_json::to_vec(value)
        .map_err(|e| GatewayError::Execution(format!("unserializable response: {}", e)))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
