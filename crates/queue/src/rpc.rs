// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire dispatch for the QueueService RPC surface.

use crate::service::QueueService;
use async_trait::async_trait;
use gavel_core::{Clock, Shard};
use gavel_wire::{EnqueueParams, InvalidateParams, RpcError, RpcHandler, ShardParams};
use serde_json::Value;
use std::sync::Arc;

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::Protocol(e.into()))
}

fn to_value<T: serde::Serialize>(data: &T) -> Result<Value, RpcError> {
    serde_json::to_value(data).map_err(|e| RpcError::Protocol(e.into()))
}

/// The QueueService behind the wire server.
pub struct QueueRpc<C: Clock>(pub Arc<QueueService<C>>);

#[async_trait]
impl<C: Clock> RpcHandler for QueueRpc<C> {
    async fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "enqueue" => {
                let params: EnqueueParams = parse(params)?;
                let operation =
                    params.operation.resolve().map_err(|e| RpcError::Remote(e.to_string()))?;
                let timestamp =
                    params.timestamp.resolve().map_err(|e| RpcError::Remote(e.to_string()))?;
                let pushed = self.0.enqueue(operation, params.priority, timestamp, params.job);
                to_value(&pushed)
            }
            "invalidate_submission" => {
                let params: InvalidateParams = parse(params)?;
                self.0
                    .invalidate_submission(&params)
                    .map_err(|e| RpcError::Remote(e.to_string()))?;
                Ok(Value::Null)
            }
            "workers_status" => to_value(&self.0.workers_status()),
            "queue_status" => to_value(&self.0.queue_status()),
            "disable_worker" => {
                let params: ShardParams = parse(params)?;
                to_value(&self.0.disable_worker(Shard(params.shard)))
            }
            "enable_worker" => {
                let params: ShardParams = parse(params)?;
                to_value(&self.0.enable_worker(Shard(params.shard)))
            }
            other => Err(RpcError::Remote(format!("unknown method {}", other))),
        }
    }
}
