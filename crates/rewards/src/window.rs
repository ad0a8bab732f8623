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

//! Accrual window and the score increment it permits.

use alloy::primitives::{U256, U512};

use crate::error::ConfigurationError;

/// Time-integrated balance. Wide enough to hold the sum of `U256 * u64` products.
pub type Score = U512;

/// Configured block range during which holding time earns score.
///
/// An absent `end_block` means the window runs until the latest block known to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualWindow {
    pub start_block: u64,
    pub end_block: Option<u64>,
}

impl AccrualWindow {
    pub fn new(start_block: u64, end_block: Option<u64>) -> Self {
        Self { start_block, end_block }
    }

    /// Check the window against itself, independent of chain state.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.end_block {
            Some(end) if self.start_block > end => {
                Err(ConfigurationError::InvalidWindow { start: self.start_block, end })
            }
            _ => Ok(()),
        }
    }

    /// Resolve the window against the latest known block.
    ///
    /// The effective end is `min(end_block, latest_known_block)`.
    pub fn effective(&self, latest_known_block: u64) -> Result<ClampedWindow, ConfigurationError> {
        self.validate()?;
        if self.start_block > latest_known_block {
            return Err(ConfigurationError::WindowAfterLatestBlock {
                start: self.start_block,
                latest: latest_known_block,
            });
        }
        let end = self.end_block.map_or(latest_known_block, |end| end.min(latest_known_block));
        Ok(ClampedWindow { start: self.start_block, end })
    }
}

/// A window with a concrete end, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedWindow {
    pub start: u64,
    pub end: u64,
}

impl ClampedWindow {
    /// Blocks of `[last_block, block]` that fall inside the window.
    ///
    /// Holding time before `start` and after `end` does not count.
    pub fn span(&self, last_block: u64, block: u64) -> u64 {
        let from = last_block.max(self.start);
        let to = block.min(self.end);
        to.saturating_sub(from)
    }

    /// Score earned by holding `balance` from `last_block` until `block`.
    pub fn increment(&self, balance: U256, last_block: u64, block: u64) -> Score {
        let span = self.span(last_block, block);
        if span == 0 || balance.is_zero() {
            return Score::ZERO;
        }
        // U256 * u64 always fits in 512 bits.
        Score::from(balance) * Score::from(span)
    }
}
