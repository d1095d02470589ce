// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gavel: grading dispatch services and operator tooling.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use gavel_core::{ContestId, DatasetId, SubmissionId};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gavel", about = "Contest grading dispatch core", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "gavel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduling service (queue, worker pool, sweeper).
    QueueService {
        /// Shard index into the configured queue service addresses.
        #[arg(long, default_value_t = 0)]
        shard: u32,
        /// Restrict scheduling to one contest; all contests when absent.
        #[arg(long)]
        contest: Option<i64>,
    },
    /// Run the persistence service (result commit, derivation).
    EvalService {
        /// Shard index into the configured evaluation service addresses.
        #[arg(long, default_value_t = 0)]
        shard: u32,
        /// Restrict to one contest; all contests when absent.
        #[arg(long)]
        contest: Option<i64>,
    },
    /// Compile and evaluate one submission in-process, bypassing the
    /// queue. Operator diagnosis only.
    DebugSubmission {
        submission_id: i64,
        testcase_codename: String,
        /// Dataset to judge on; the task's active dataset when absent.
        #[arg(short, long)]
        dataset_id: Option<i64>,
        /// Worker address to execute on; with no worker the built jobs
        /// are printed without being run.
        #[arg(long)]
        worker: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = config::GavelConfig::load(&cli.config)?;

    match cli.command {
        Command::QueueService { shard, contest } => {
            commands::serve::queue_service(&config, shard, contest.map(ContestId::new)).await
        }
        Command::EvalService { shard, contest } => {
            commands::serve::eval_service(&config, shard, contest.map(ContestId::new)).await
        }
        Command::DebugSubmission { submission_id, testcase_codename, dataset_id, worker } => {
            commands::debug::debug_submission(
                &config,
                SubmissionId::new(submission_id),
                dataset_id.map(DatasetId::new),
                &testcase_codename,
                worker.as_deref(),
            )
            .await
        }
    }
}
