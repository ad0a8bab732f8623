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

//! Error types for the distribution pipeline.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// The event log contradicts itself: a holder spends tokens it never received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("{holder} spends {amount} of {instrument} at block {block} before any recorded receipt")]
    SpendBeforeReceipt { instrument: Address, holder: Address, amount: U256, block: u64 },

    #[error(
        "balance of {holder} would go negative at block {block}: holds {balance}, spends {amount} of {instrument}"
    )]
    NegativeBalance {
        instrument: Address,
        holder: Address,
        balance: U256,
        amount: U256,
        block: u64,
    },
}

/// The run was configured in a way that cannot produce a meaningful distribution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid accrual window: start block {start} is after end block {end}")]
    InvalidWindow { start: u64, end: u64 },

    #[error("accrual window starts at block {start} but the latest known block is {latest}")]
    WindowAfterLatestBlock { start: u64, latest: u64 },

    #[error("invalid minimum share {0:?}: expected a decimal fraction in [0, 1)")]
    InvalidMinShare(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("inconsistent event log: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("arithmetic overflow while processing {holder} at block {block}")]
    Overflow { holder: Address, block: u64 },

    #[error("arithmetic overflow while allocating rewards to {0}")]
    AllocationOverflow(Address),

    #[error("address {0} appears more than once in the distribution")]
    DuplicateLeaf(Address),
}
