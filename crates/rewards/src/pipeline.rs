// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end distribution: events in, Merkle artifact out.

use std::time::Instant;

use alloy::primitives::{Address, U256};
use anyhow::Context;

use crate::{
    allocation::{allocate_rewards, Allocation, MinShare},
    artifact::{ArtifactSink, DistributionArtifact},
    error::DistributionError,
    events::TransferEvent,
    merkle::commit_leaves,
    score::accumulate_scores,
    sources::{EventFeed, LedgerClock, PoolSizeSource},
    window::{AccrualWindow, ClampedWindow},
};

/// Parameters of the pure computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionConfig {
    pub window: AccrualWindow,
    pub min_share: MinShare,
}

impl DistributionConfig {
    pub fn new(window: AccrualWindow) -> Self {
        Self { window, min_share: MinShare::default() }
    }

    pub fn with_min_share(self, min_share: MinShare) -> Self {
        Self { min_share, ..self }
    }

    pub fn validate(&self) -> Result<(), DistributionError> {
        Ok(self.window.validate()?)
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct Distribution {
    /// Window after clamping to the latest known block
    pub window: ClampedWindow,
    pub allocation: Allocation,
    pub artifact: DistributionArtifact,
}

/// Compute the distribution for an already fetched event log.
///
/// Deterministic: the same events and parameters always give the same root and proofs.
pub fn compute_distribution(
    events: &[TransferEvent],
    config: &DistributionConfig,
    latest_known_block: u64,
    pool: U256,
) -> Result<Distribution, DistributionError> {
    config.validate()?;
    let window = config.window.effective(latest_known_block)?;

    let scores = accumulate_scores(events, window)?;
    let allocation = allocate_rewards(&scores, pool, config.min_share)?;
    let artifact = commit_leaves(&allocation.leaves)?;

    Ok(Distribution { window, allocation, artifact })
}

/// What to distribute over which instruments.
#[derive(Debug, Clone)]
pub struct DistributionJob {
    pub instruments: Vec<Address>,
    /// First block to read transfers from. Must not be later than the first transfer of any
    /// tracked instrument, or balances will be incomplete.
    pub from_block: u64,
    pub config: DistributionConfig,
}

/// Fetch, compute and publish one distribution.
pub async fn run_distribution(
    job: &DistributionJob,
    feed: &dyn EventFeed,
    clock: &dyn LedgerClock,
    pool_source: &dyn PoolSizeSource,
    sink: &dyn ArtifactSink,
) -> anyhow::Result<Distribution> {
    let start_time = Instant::now();
    job.config.validate()?;

    let latest_block = clock.latest_block().await?;
    let window = job.config.window.effective(latest_block)?;
    tracing::info!(
        "Accrual window [{}, {}] (latest block {})",
        window.start,
        window.end,
        latest_block
    );

    let fetch_start = Instant::now();
    let events = feed
        .fetch_transfers(&job.instruments, job.from_block, window.end)
        .await
        .context("Failed to fetch transfer events")?;
    tracing::info!(
        "Fetched {} transfer events in {:.2}s",
        events.len(),
        fetch_start.elapsed().as_secs_f64()
    );

    let pool = pool_source.pool_size().await?;
    let distribution = compute_distribution(&events, &job.config, latest_block, pool)?;

    let allocation = &distribution.allocation;
    if distribution.artifact.is_empty() {
        tracing::warn!(
            "Nothing to distribute: no holder passed the minimum share of {}",
            job.config.min_share
        );
    }
    tracing::info!(
        "Allocated {} of pool {} to {} of {} holders ({} undistributed), root {}",
        allocation.distributed,
        allocation.pool,
        allocation.leaves.len(),
        allocation.shares.len(),
        allocation.residual(),
        distribution.artifact.root
    );

    sink.publish(&distribution.artifact).await?;

    tracing::info!("Distribution completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(distribution)
}
