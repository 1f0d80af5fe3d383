//! HTTP Transport with Server-Sent Events
//!
//! Exposes discovery, execution, and resource fetch as plain JSON
//! endpoints, plus a long-lived SSE stream that pushes the tool
//! catalog whenever the registry changes and on a fixed heartbeat.
//! Version negotiation happens per request from the client's
//! advertisement header; the selected version is echoed back in the
//! response headers.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::{GatewayContext, ReadySignal, Transport};
use crate::error::GatewayError;
use crate::negotiate::{NEGOTIATED_HEADER, VERSIONS_HEADER};
use crate::registry::{RegistryObserver, ToolDescriptor};
use crate::resources::Method;
use crate::session::TransportKind;

/// How often the stream re-sends the catalog without a change.
const STREAM_REFRESH: Duration = Duration::from_secs(5);

/// Transport serving the gateway's HTTP surface on one socket.
#[derive(Debug)]
pub struct HttpTransport {
    addr: SocketAddr,
}

impl HttpTransport {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(
        self: Box<Self>,
        ctx: GatewayContext,
        cancel: CancellationToken,
        ready: ReadySignal,
    ) -> Result<(), GatewayError> {
        let app = gateway_router(ctx, cancel.clone());
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "HTTP transport listening");
        let _ = ready.send(());

        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    ctx: GatewayContext,
    changes: broadcast::Sender<Vec<ToolDescriptor>>,
    cancel: CancellationToken,
}

/// Forwards registry mutations into the stream fanout channel.
struct ChangeFeed {
    tx: broadcast::Sender<Vec<ToolDescriptor>>,
}

impl RegistryObserver for ChangeFeed {
    fn on_tools_changed(&self, tools: &[ToolDescriptor]) -> Result<(), GatewayError> {
        // No receivers is fine; streams subscribe lazily.
        let _ = self.tx.send(tools.to_vec());
        Ok(())
    }
}

/// Build the gateway's HTTP router. Exposed so tests can drive the
/// handlers without binding a socket.
pub fn gateway_router(ctx: GatewayContext, cancel: CancellationToken) -> Router {
    let (changes, _) = broadcast::channel(16);
    ctx.registry
        .register_observer(std::sync::Arc::new(ChangeFeed { tx: changes.clone() }));

    Router::new()
        .route("/gateway/discovery", get(discovery))
        .route("/gateway/execute/{tool}", post(execute))
        .route("/gateway/stream", get(stream))
        .route("/gateway/resources/{*uri}", any(resource))
        .with_state(AppState { ctx, changes, cancel })
}

fn advertised(headers: &HeaderMap) -> Option<&str> {
    headers.get(VERSIONS_HEADER).and_then(|v| v.to_str().ok())
}

fn version_headers(state: &AppState, headers: &HeaderMap) -> [(&'static str, String); 2] {
    let negotiated = state.ctx.negotiator.detect_version(advertised(headers));
    [
        (NEGOTIATED_HEADER, negotiated.to_string()),
        (VERSIONS_HEADER, state.ctx.negotiator.advertisement()),
    ]
}

fn status_for(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::Configuration(_) | GatewayError::Transport(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::Validation(_) | GatewayError::Execution(_) => StatusCode::BAD_REQUEST,
    }
}

fn error_response(error: &GatewayError) -> Response {
    (status_for(error), Json(json!({ "detail": error.to_string() }))).into_response()
}

async fn discovery(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let tools = state.ctx.registry.descriptors();
    (
        version_headers(&state, &headers),
        Json(json!({ "tools": tools })),
    )
        .into_response()
}

async fn execute(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let Some(tool) = state.ctx.registry.get_tool(&tool_name) else {
        return error_response(&GatewayError::tool_not_found(&tool_name));
    };

    let params = body.map(|Json(v)| v).unwrap_or_else(|| json!({}));
    match tool.execute(params).await {
        Ok(result) => (
            version_headers(&state, &headers),
            Json(json!({ "result": result })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(tool = %tool_name, error = %e, "Tool execution failed");
            error_response(&e)
        }
    }
}

async fn resource(
    State(state): State<AppState>,
    Path(uri): Path<String>,
    method: axum::http::Method,
    body: Option<Json<Value>>,
) -> Response {
    let method = match method {
        axum::http::Method::GET => Method::Get,
        axum::http::Method::POST => Method::Post,
        axum::http::Method::PUT => Method::Put,
        axum::http::Method::DELETE => Method::Delete,
        _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    // The wildcard capture drops the leading slash templates carry.
    let uri = format!("/{}", uri);
    let Some((provider, params)) = state.ctx.router.resolve(method, &uri) else {
        return error_response(&GatewayError::no_matching_resource(&uri));
    };

    match provider.fetch(method, params, body.map(|Json(v)| v)).await {
        Ok(result) => Json(json!({ "result": result })).into_response(),
        Err(e) => {
            tracing::warn!(uri = %uri, error = %e, "Resource fetch failed");
            error_response(&e)
        }
    }
}

async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let version = state
        .ctx
        .negotiator
        .detect_version(advertised(&headers))
        .to_string();
    let session_id = state.ctx.sessions.open(version, TransportKind::Http);

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);
    let mut changes = state.changes.subscribe();
    let ctx = state.ctx.clone();
    let cancel = state.cancel.clone();

    tokio::spawn(async move {
        let mut refresh = tokio::time::interval(STREAM_REFRESH);
        loop {
            let tools = tokio::select! {
                _ = cancel.cancelled() => break,
                changed = changes.recv() => match changed {
                    Ok(tools) => tools,
                    // A lagged receiver just re-reads the current state.
                    Err(broadcast::error::RecvError::Lagged(_)) => ctx.registry.descriptors(),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = refresh.tick() => ctx.registry.descriptors(),
            };

            let event = match Event::default().event("tools").json_data(json!({ "tools": tools })) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unserializable stream event");
                    continue;
                }
            };
            if tx.send(Ok(event)).await.is_err() {
                break;
            }
        }
        ctx.sessions.close(&session_id);
    });

    Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text("ping"))
}
