// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire dispatch for the EvaluationService RPC surface.

use crate::service::EvaluationService;
use async_trait::async_trait;
use gavel_wire::{
    NewSubmissionParams, NewSubmissionsParams, NewUserTestParams, RpcError, RpcHandler,
    WriteResultParams,
};
use serde_json::Value;
use std::sync::Arc;

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::Protocol(e.into()))
}

/// The EvaluationService behind the wire server.
pub struct EvalRpc(pub Arc<EvaluationService>);

#[async_trait]
impl RpcHandler for EvalRpc {
    async fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "write_result" => {
                let params: WriteResultParams = parse(params)?;
                let operation =
                    params.operation.resolve().map_err(|e| RpcError::Remote(e.to_string()))?;
                let outcome = self.0.write_result(operation, params.job);
                serde_json::to_value(outcome).map_err(|e| RpcError::Protocol(e.into()))
            }
            "new_submission" => {
                let params: NewSubmissionParams = parse(params)?;
                self.0.new_submission(params.submission_id, params.dataset_id, params.force_priority);
                Ok(Value::Null)
            }
            "new_submissions" => {
                let params: NewSubmissionsParams = parse(params)?;
                self.0.new_submissions(params.submission_ids);
                Ok(Value::Null)
            }
            "new_user_test" => {
                let params: NewUserTestParams = parse(params)?;
                self.0.new_user_test(params.user_test_id);
                Ok(Value::Null)
            }
            other => Err(RpcError::Remote(format!("unknown method {}", other))),
        }
    }
}
