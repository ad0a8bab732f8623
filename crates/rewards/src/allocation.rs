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

//! Proportional reward allocation.

use std::{fmt, str::FromStr};

use alloy::primitives::{ruint::aliases::U1024, Address, U256};

use crate::{
    error::{ConfigurationError, DistributionError},
    score::HolderScores,
    window::Score,
};

/// Most fractional digits accepted when parsing a [MinShare].
const MAX_FRACTION_DIGITS: usize = 30;

/// Share of the total score a holder must strictly exceed to receive rewards.
///
/// Stored as an exact fraction so the threshold comparison involves no rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinShare {
    numerator: u128,
    denominator: u128,
}

impl MinShare {
    /// 0.1%
    pub const DEFAULT: Self = Self { numerator: 1, denominator: 1_000 };

    /// No filtering beyond excluding holders without any score.
    pub const ZERO: Self = Self { numerator: 0, denominator: 1 };

    /// The fraction `numerator / denominator`, kept in lowest terms so equal shares compare equal.
    pub fn new(numerator: u128, denominator: u128) -> Result<Self, ConfigurationError> {
        if denominator == 0 || numerator >= denominator {
            return Err(ConfigurationError::InvalidMinShare(format!("{numerator}/{denominator}")));
        }
        let divisor = gcd(numerator, denominator);
        Ok(Self { numerator: numerator / divisor, denominator: denominator / divisor })
    }

    /// Whether `score / total` is strictly greater than this share.
    fn is_exceeded_by(&self, score: Score, total: Score) -> Option<bool> {
        let lhs = score.checked_mul(Score::from(self.denominator))?;
        let rhs = total.checked_mul(Score::from(self.numerator))?;
        Some(lhs > rhs)
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Default for MinShare {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for MinShare {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidMinShare(s.to_string());
        let (int, frac) = s.trim().split_once('.').unwrap_or((s.trim(), ""));
        if int.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !int.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > MAX_FRACTION_DIGITS || int.trim_start_matches('0') != "" {
            return Err(invalid());
        }
        let denominator = 10u128.pow(frac.len() as u32);
        let numerator =
            if frac.is_empty() { 0 } else { frac.parse::<u128>().map_err(|_| invalid())? };
        Self::new(numerator, denominator).map_err(|_| invalid())
    }
}

impl fmt::Display for MinShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A committed `(address, amount)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionLeaf {
    pub address: Address,
    pub amount: U256,
}

/// Allocation outcome for one holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardShare {
    pub address: Address,
    pub score: Score,
    /// `floor(score / total_score * pool)`, before the minimum-share filter
    pub entitlement: U256,
    /// Whether the holder passed the minimum-share filter
    pub included: bool,
}

impl RewardShare {
    /// Amount actually distributed to the holder.
    pub fn amount(&self) -> U256 {
        if self.included {
            self.entitlement
        } else {
            U256::ZERO
        }
    }

    /// Normalized share in basis points, truncated.
    pub fn basis_points(&self, total_score: Score) -> u64 {
        if total_score.is_zero() {
            return 0;
        }
        (self.score.saturating_mul(Score::from(10_000u64)) / total_score).to::<u64>()
    }
}

/// Result of splitting a reward pool over holder scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub total_score: Score,
    pub pool: U256,
    /// Every holder with a checkpoint, in address order
    pub shares: Vec<RewardShare>,
    /// Holders that passed the filter, in address order
    pub leaves: Vec<DistributionLeaf>,
    /// Sum of all leaf amounts, never more than `pool`
    pub distributed: U256,
}

impl Allocation {
    /// Pool left undistributed: rounding dust plus forfeited below-threshold entitlement.
    pub fn residual(&self) -> U256 {
        self.pool - self.distributed
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

/// Split `pool` proportionally to `scores`.
///
/// Holders whose share does not strictly exceed `min_share` are dropped and their entitlement is
/// not redistributed. Amounts are truncated, so the distributed total never exceeds the pool.
/// A zero total score yields an empty allocation.
pub fn allocate_rewards(
    scores: &HolderScores,
    pool: U256,
    min_share: MinShare,
) -> Result<Allocation, DistributionError> {
    let total_score: Score = scores.values().sum();
    let mut shares = Vec::with_capacity(scores.len());
    let mut leaves = Vec::new();
    let mut distributed = U256::ZERO;

    if total_score.is_zero() {
        tracing::debug!("No score accrued in the window; nothing to allocate");
        return Ok(Allocation { total_score, pool, shares, leaves, distributed });
    }

    // `score * pool` needs up to 256 bits more than a score.
    let pool_wide = U1024::from(pool);
    let total_wide = U1024::from(total_score);
    for (&address, &score) in scores {
        let overflow = || DistributionError::AllocationOverflow(address);
        let entitlement =
            U1024::from(score).checked_mul(pool_wide).ok_or_else(overflow)? / total_wide;
        // score <= total_score, so the quotient is at most `pool`.
        let entitlement = U256::checked_from_uint(entitlement).ok_or_else(overflow)?;
        let included = min_share.is_exceeded_by(score, total_score).ok_or_else(overflow)?;

        if included {
            leaves.push(DistributionLeaf { address, amount: entitlement });
            distributed += entitlement;
        }
        shares.push(RewardShare { address, score, entitlement, included });
    }

    tracing::debug!(
        "Allocated {} of {} to {} holders ({} below minimum share)",
        distributed,
        pool,
        leaves.len(),
        shares.len() - leaves.len()
    );

    Ok(Allocation { total_score, pool, shares, leaves, distributed })
}
