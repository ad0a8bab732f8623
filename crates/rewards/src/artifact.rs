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

//! The published distribution artifact and where it goes.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy::primitives::{Address, B256, U256};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::merkle::{leaf_hash, verify_proof, EMPTY_ROOT};

/// A holder's claim: amount and inclusion proof against the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProof {
    #[serde(with = "decimal_u256")]
    pub amount: U256,
    /// Sibling hashes from the leaf up to the root
    pub proof: Vec<B256>,
}

/// Merkle root plus one proof per holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionArtifact {
    pub root: B256,
    pub proofs: BTreeMap<Address, ClaimProof>,
}

impl DistributionArtifact {
    /// The artifact of a distribution with nothing to distribute.
    pub fn empty() -> Self {
        Self { root: EMPTY_ROOT, proofs: BTreeMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    pub fn total_amount(&self) -> U256 {
        self.proofs.values().map(|claim| claim.amount).sum()
    }

    /// Check the stored proof of `address` against the root.
    pub fn verify(&self, address: &Address) -> bool {
        self.proofs.get(address).is_some_and(|claim| {
            verify_proof(self.root, leaf_hash(*address, claim.amount), &claim.proof)
        })
    }

    /// Addresses whose stored proof does not reproduce the root.
    pub fn invalid_claims(&self) -> Vec<Address> {
        self.proofs.keys().filter(|address| !self.verify(address)).copied().collect()
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize distribution artifact")
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse distribution artifact")
    }

    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read artifact from {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// Amounts are published as decimal strings.
mod decimal_u256 {
    use alloy::primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(D::Error::custom)
    }
}

/// Destination of a finished distribution.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn publish(&self, artifact: &DistributionArtifact) -> anyhow::Result<()>;
}

/// Writes the artifact as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArtifactSink for JsonFileSink {
    async fn publish(&self, artifact: &DistributionArtifact) -> anyhow::Result<()> {
        let json = artifact.to_json_pretty()?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write artifact to {}", self.path.display()))?;
        tracing::info!(
            "Wrote distribution for {} holders to {} (root {})",
            artifact.proofs.len(),
            self.path.display(),
            artifact.root
        );
        Ok(())
    }
}

/// Reports the artifact through the log and persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSink;

#[async_trait]
impl ArtifactSink for DryRunSink {
    async fn publish(&self, artifact: &DistributionArtifact) -> anyhow::Result<()> {
        tracing::info!(
            "Dry run: root {} commits {} to {} holders",
            artifact.root,
            artifact.total_amount(),
            artifact.proofs.len()
        );
        for (address, claim) in &artifact.proofs {
            tracing::info!("  {address}: {} ({} proof elements)", claim.amount, claim.proof.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{allocation::DistributionLeaf, merkle::commit_leaves};
    use alloy::primitives::address;
    use tracing_test::traced_test;

    const ALICE: Address = address!("0x00000000000000000000000000000000000000a1");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    fn artifact() -> DistributionArtifact {
        commit_leaves(&[
            DistributionLeaf { address: ALICE, amount: U256::from(100) },
            DistributionLeaf { address: BOB, amount: U256::from(200) },
        ])
        .unwrap()
    }

    #[test]
    fn json_layout_uses_hex_hashes_and_decimal_amounts() {
        let json: serde_json::Value =
            serde_json::from_str(&artifact().to_json_pretty().unwrap()).unwrap();

        assert_eq!(
            json["root"],
            "0x7a38422a2c0ed29b506ef622d36e6740c6f6aeed0cb4caea0cf04ec43e1d940b"
        );
        let alice = &json["proofs"]["0x00000000000000000000000000000000000000a1"];
        assert_eq!(alice["amount"], "100");
        assert_eq!(
            alice["proof"][0],
            "0x6bbaffbf83017213ffdae5211fcef7b98092f6693d507ead2261bbe9a570c897"
        );
    }

    #[test]
    fn parses_published_json() {
        let original = artifact();
        let parsed = DistributionArtifact::from_json(&original.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, original);
        assert!(parsed.invalid_claims().is_empty());
    }

    #[test]
    fn rejects_hex_amounts() {
        let json = r#"{"root":"0x0000000000000000000000000000000000000000000000000000000000000000",
            "proofs":{"0x00000000000000000000000000000000000000a1":{"amount":"0x10","proof":[]}}}"#;
        assert!(DistributionArtifact::from_json(json).is_err());
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let mut tampered = artifact();
        tampered.proofs.get_mut(&ALICE).unwrap().amount = U256::from(101);
        assert_eq!(tampered.invalid_claims(), vec![ALICE]);
        assert!(tampered.verify(&BOB));
    }

    #[tokio::test]
    async fn file_sink_writes_loadable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("distribution.json"));

        sink.publish(&artifact()).await.unwrap();

        let loaded = DistributionArtifact::load(sink.path()).await.unwrap();
        assert_eq!(loaded, artifact());
    }

    #[tokio::test]
    #[traced_test]
    async fn dry_run_reports_without_writing() {
        DryRunSink.publish(&artifact()).await.unwrap();
        assert!(logs_contain("commits 300 to 2 holders"));
    }
}
