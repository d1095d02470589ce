// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment configuration: where each service shard listens, where the
//! worker fleet lives, and which store snapshot seeds the in-memory
//! datastore.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GavelConfig {
    /// Listen addresses of the queue service shards.
    #[serde(default)]
    pub queue_services: Vec<String>,
    /// Listen addresses of the evaluation service shards.
    #[serde(default)]
    pub evaluation_services: Vec<String>,
    /// Addresses of the scoring services.
    #[serde(default)]
    pub scoring_services: Vec<String>,
    /// Addresses of the worker fleet, indexed by shard.
    #[serde(default)]
    pub workers: Vec<String>,
    /// Store snapshot standing in for the relational store.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

impl GavelConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn shard_addr<'a>(
        &'a self,
        addrs: &'a [String],
        what: &str,
        shard: u32,
    ) -> anyhow::Result<&'a str> {
        addrs
            .get(shard as usize)
            .map(String::as_str)
            .with_context(|| format!("no {} address configured for shard {}", what, shard))
    }
}
