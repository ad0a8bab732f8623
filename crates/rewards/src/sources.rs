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

//! Ledger-facing collaborators of the distribution pipeline.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
};
use anyhow::Context;
use async_trait::async_trait;

use crate::events::{fetch_transfer_events, TransferEvent, IERC20};

/// Supplies the transfer history of the tracked instruments.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// All transfers of `instruments` in `[from_block, to_block]`, each tagged with its block.
    async fn fetch_transfers(
        &self,
        instruments: &[Address],
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<TransferEvent>>;
}

/// Reports the latest block the ledger knows about.
#[async_trait]
pub trait LedgerClock: Send + Sync {
    async fn latest_block(&self) -> anyhow::Result<u64>;
}

/// Reports the size of the reward pool, in the reward asset's smallest unit.
#[async_trait]
pub trait PoolSizeSource: Send + Sync {
    async fn pool_size(&self) -> anyhow::Result<U256>;
}

/// [EventFeed] and [LedgerClock] backed by an RPC provider.
#[derive(Debug, Clone)]
pub struct RpcLedger<P> {
    provider: P,
}

impl<P: Provider> RpcLedger<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider> EventFeed for RpcLedger<P> {
    async fn fetch_transfers(
        &self,
        instruments: &[Address],
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<TransferEvent>> {
        fetch_transfer_events(&self.provider, instruments, from_block, to_block).await
    }
}

#[async_trait]
impl<P: Provider> LedgerClock for RpcLedger<P> {
    async fn latest_block(&self) -> anyhow::Result<u64> {
        self.provider.get_block_number().await.context("Failed to get latest block number")
    }
}

/// A pool of fixed size, for simulations and dry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoolSize(pub U256);

#[async_trait]
impl PoolSizeSource for FixedPoolSize {
    async fn pool_size(&self) -> anyhow::Result<U256> {
        Ok(self.0)
    }
}

/// The reward token balance currently held by the distributor.
#[derive(Debug, Clone)]
pub struct Erc20PoolBalance<P> {
    provider: P,
    token: Address,
    distributor: Address,
}

impl<P: Provider> Erc20PoolBalance<P> {
    pub fn new(provider: P, token: Address, distributor: Address) -> Self {
        Self { provider, token, distributor }
    }
}

#[async_trait]
impl<P: Provider> PoolSizeSource for Erc20PoolBalance<P> {
    async fn pool_size(&self) -> anyhow::Result<U256> {
        let token = IERC20::new(self.token, &self.provider);
        let balance = token.balanceOf(self.distributor).call().await.with_context(|| {
            format!("Failed to get {} balance of distributor {}", self.token, self.distributor)
        })?;
        tracing::info!("Distributor {} holds {} of {}", self.distributor, balance, self.token);
        Ok(balance)
    }
}
