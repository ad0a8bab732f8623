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

//! Time-weighted holder rewards with a Merkle commitment.
//!
//! Transfer events of a set of instruments are turned into a per-holder holding score, the score
//! is used to split a reward pool, and the resulting `(address, amount)` pairs are committed to a
//! Merkle root with one inclusion proof per holder.

pub mod allocation;
pub mod artifact;
pub mod error;
pub mod events;
pub mod merkle;
pub mod pipeline;
pub mod score;
pub mod sources;
pub mod window;

pub use allocation::{allocate_rewards, Allocation, DistributionLeaf, MinShare, RewardShare};
pub use artifact::{ArtifactSink, ClaimProof, DistributionArtifact, DryRunSink, JsonFileSink};
pub use error::{ConfigurationError, ConsistencyError, DistributionError};
pub use events::{fetch_transfer_events, query_logs_chunked, Party, TransferEvent, IERC20};
pub use merkle::{commit_leaves, leaf_hash, node_hash, verify_proof, MerkleTree, EMPTY_ROOT};
pub use pipeline::{
    compute_distribution, run_distribution, Distribution, DistributionConfig, DistributionJob,
};
pub use score::{accumulate_scores, HolderCheckpoint, HolderScores, ScoreAccumulator};
pub use sources::{
    Erc20PoolBalance, EventFeed, FixedPoolSize, LedgerClock, PoolSizeSource, RpcLedger,
};
pub use window::{AccrualWindow, ClampedWindow, Score};
