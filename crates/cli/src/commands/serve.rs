// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service launchers.

use crate::config::GavelConfig;
use anyhow::Context;
use gavel_core::{ContestId, Shard, SystemClock};
use gavel_eval::{EvalRpc, EvaluationService};
use gavel_queue::{QueueRpc, QueueService};
use gavel_store::{MemStore, Snapshot};
use gavel_wire::{RemoteEval, RemoteQueue, RemoteScoring, RemoteService, RemoteWorker};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn load_store(config: &GavelConfig) -> anyhow::Result<Arc<MemStore>> {
    match &config.snapshot {
        Some(path) => {
            let snapshot = Snapshot::load(path).context("loading store snapshot")?;
            Ok(Arc::new(snapshot.into_store()))
        }
        None => Ok(Arc::new(MemStore::new())),
    }
}

/// Run one QueueService shard until interrupted.
pub async fn queue_service(
    config: &GavelConfig,
    shard: u32,
    contest: Option<ContestId>,
) -> anyhow::Result<()> {
    let addr = config.shard_addr(&config.queue_services, "queue service", shard)?;
    let store = load_store(config)?;
    let service = QueueService::new(contest, store, SystemClock);

    for (index, worker_addr) in config.workers.iter().enumerate() {
        let worker = RemoteWorker(RemoteService::connect(worker_addr.clone()));
        service
            .add_worker(Shard(index as u32), Arc::new(worker))
            .map_err(|e| anyhow::anyhow!("registering worker {}: {}", index, e))?;
    }
    for eval_addr in &config.evaluation_services {
        service.add_eval_client(Arc::new(RemoteEval(RemoteService::connect(eval_addr.clone()))));
    }
    service.start();

    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    info!(shard, addr, workers = config.workers.len(), "queue service listening");
    gavel_wire::serve(listener, Arc::new(QueueRpc(service)), CancellationToken::new()).await;
    Ok(())
}

/// Run one EvaluationService shard until interrupted.
pub async fn eval_service(
    config: &GavelConfig,
    shard: u32,
    contest: Option<ContestId>,
) -> anyhow::Result<()> {
    let addr = config.shard_addr(&config.evaluation_services, "evaluation service", shard)?;
    let queue_addr = config.shard_addr(&config.queue_services, "queue service", 0)?;
    let scoring_addr = config.shard_addr(&config.scoring_services, "scoring service", 0)?;
    let store = load_store(config)?;

    let queue = Arc::new(RemoteQueue(RemoteService::connect(queue_addr.to_string())));
    let scoring = Arc::new(RemoteScoring(RemoteService::connect(scoring_addr.to_string())));
    let service = EvaluationService::new(contest, store, queue, scoring);

    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    info!(shard, addr, "evaluation service listening");
    gavel_wire::serve(listener, Arc::new(EvalRpc(service)), CancellationToken::new()).await;
    Ok(())
}
