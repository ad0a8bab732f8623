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

//! Time-weighted holding score accumulation.
//!
//! Events are consumed in ascending block order. Each holder keeps a [HolderCheckpoint]; whenever
//! its balance changes, the score earned by the previous balance since the last checkpoint is
//! accrued first. A final accrual carries every balance to the end of the window.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};

use crate::{
    error::{ConsistencyError, DistributionError},
    events::{Party, TransferEvent},
    window::{ClampedWindow, Score},
};

/// Final score per holder, in address order.
pub type HolderScores = BTreeMap<Address, Score>;

/// Running state of one holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderCheckpoint {
    /// Balance as of `last_block`
    pub balance: U256,
    pub last_block: u64,
    /// Score accrued up to `last_block`; never decreases
    pub accrued_score: Score,
}

impl HolderCheckpoint {
    fn new(block: u64) -> Self {
        Self { balance: U256::ZERO, last_block: block, accrued_score: Score::ZERO }
    }

    /// Accrue the score of the current balance up to `block` and move the checkpoint there.
    fn advance(&mut self, window: &ClampedWindow, block: u64) -> Option<()> {
        let increment = window.increment(self.balance, self.last_block, block);
        self.accrued_score = self.accrued_score.checked_add(increment)?;
        self.last_block = block;
        Some(())
    }
}

/// Per-holder checkpoint table for a single batch run.
#[derive(Debug, Clone)]
pub struct ScoreAccumulator {
    window: ClampedWindow,
    checkpoints: BTreeMap<Address, HolderCheckpoint>,
    minted: Score,
    burned: Score,
}

impl ScoreAccumulator {
    pub fn new(window: ClampedWindow) -> Self {
        Self { window, checkpoints: BTreeMap::new(), minted: Score::ZERO, burned: Score::ZERO }
    }

    pub fn checkpoint(&self, holder: &Address) -> Option<&HolderCheckpoint> {
        self.checkpoints.get(holder)
    }

    pub fn checkpoints(&self) -> &BTreeMap<Address, HolderCheckpoint> {
        &self.checkpoints
    }

    /// Supply minted minus supply burned so far.
    pub fn circulating_supply(&self) -> Score {
        self.minted - self.burned
    }

    /// Sum of all holder balances.
    pub fn total_balance(&self) -> Score {
        self.checkpoints.values().map(|c| Score::from(c.balance)).sum()
    }

    /// Apply one event. Events must be applied in ascending block order.
    ///
    /// A rejected event leaves the accumulator unchanged.
    pub fn apply(&mut self, event: &TransferEvent) -> Result<(), DistributionError> {
        let block = event.block;
        // Updated checkpoints, written back only once the whole event is valid.
        let mut staged: Vec<(Address, HolderCheckpoint)> = Vec::with_capacity(2);

        if let Party::Holder(to) = event.to {
            let overflow = || DistributionError::Overflow { holder: to, block };
            let mut checkpoint = self
                .checkpoints
                .get(&to)
                .cloned()
                .unwrap_or_else(|| HolderCheckpoint::new(block));
            checkpoint.advance(&self.window, block).ok_or_else(overflow)?;
            checkpoint.balance = checkpoint.balance.checked_add(event.amount).ok_or_else(overflow)?;
            staged.push((to, checkpoint));
        }

        if let Party::Holder(from) = event.from {
            // A self-transfer spends from the checkpoint just credited.
            let pending = staged.iter().position(|(holder, _)| *holder == from);
            let mut checkpoint = match pending {
                Some(idx) => staged.swap_remove(idx).1,
                None => self.checkpoints.get(&from).cloned().ok_or(
                    ConsistencyError::SpendBeforeReceipt {
                        instrument: event.instrument,
                        holder: from,
                        amount: event.amount,
                        block,
                    },
                )?,
            };
            checkpoint
                .advance(&self.window, block)
                .ok_or(DistributionError::Overflow { holder: from, block })?;
            checkpoint.balance = checkpoint.balance.checked_sub(event.amount).ok_or(
                ConsistencyError::NegativeBalance {
                    instrument: event.instrument,
                    holder: from,
                    balance: checkpoint.balance,
                    amount: event.amount,
                    block,
                },
            )?;
            staged.push((from, checkpoint));
        }

        self.checkpoints.extend(staged);
        match (event.from, event.to) {
            (Party::SystemSupply, Party::Holder(_)) => self.minted += Score::from(event.amount),
            (Party::Holder(_), Party::SystemSupply) => self.burned += Score::from(event.amount),
            _ => {}
        }
        Ok(())
    }

    /// Carry every balance to the end of the window and return the final scores.
    pub fn finalize(mut self) -> Result<HolderScores, DistributionError> {
        let end = self.window.end;
        for (holder, checkpoint) in self.checkpoints.iter_mut() {
            // Checkpoints created after the window keep their block; they accrue nothing anyway.
            let block = end.max(checkpoint.last_block);
            checkpoint
                .advance(&self.window, block)
                .ok_or(DistributionError::Overflow { holder: *holder, block })?;
        }
        tracing::debug!(
            "Finalized scores for {} holders at block {}",
            self.checkpoints.len(),
            end
        );
        Ok(self.checkpoints.into_iter().map(|(holder, c)| (holder, c.accrued_score)).collect())
    }
}

/// Compute final holder scores from an event log.
///
/// Events are stable-sorted by block; events sharing a block keep the order they were supplied in.
pub fn accumulate_scores(
    events: &[TransferEvent],
    window: ClampedWindow,
) -> Result<HolderScores, DistributionError> {
    let mut ordered: Vec<&TransferEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.block);

    let mut accumulator = ScoreAccumulator::new(window);
    for event in ordered {
        accumulator.apply(event)?;
    }
    accumulator.finalize()
}
