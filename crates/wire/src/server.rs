// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serve loop: accept connections, answer one request each.

use crate::client::RpcError;
use crate::envelope::{RpcRequest, RpcResponse};
use crate::frame::{decode, encode, read_frame, write_frame, ProtocolError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Dispatches one RPC method to its typed handler.
///
/// `ping` is answered by the serve loop itself and never reaches the
/// handler.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// Accept connections until cancelled, answering one request per
/// connection. Each connection runs in its own task so a long-running
/// method (a worker executing a job group) never blocks the loop.
pub async fn serve(listener: TcpListener, handler: Arc<dyn RpcHandler>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                };
                debug!(peer = %peer, "connection accepted");
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handler).await {
                        match e {
                            ProtocolError::ConnectionClosed => debug!("client disconnected"),
                            other => warn!(error = %other, "connection error"),
                        }
                    }
                });
            }
        }
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    handler: Arc<dyn RpcHandler>,
) -> Result<(), ProtocolError> {
    let raw = read_frame(&mut stream).await?;
    let request: RpcRequest = decode(&raw)?;

    let response = if request.method == "ping" {
        RpcResponse::success(Value::Null)
    } else {
        match handler.handle(&request.method, request.params).await {
            Ok(data) => RpcResponse::success(data),
            Err(e) => {
                warn!(method = %request.method, error = %e, "rpc failed");
                RpcResponse::failure(e.to_string())
            }
        }
    };

    let payload = encode(&response)?;
    write_frame(&mut stream, &payload).await
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
