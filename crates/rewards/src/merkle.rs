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

//! Keccak-256 Merkle tree over distribution leaves.
//!
//! The encoding is a compatibility contract with on-chain verifiers:
//! - Leaf hash: `keccak256(address || amount)`, i.e. `abi.encodePacked(address, uint256)`: the
//!   20 address bytes followed by the 32-byte big-endian amount.
//! - Internal node: `keccak256(min(a, b) || max(a, b))`. Sorting each pair means a proof is just
//!   the list of siblings; no left/right bits are needed.
//!
//! Leaf hashes are sorted before the tree is built, so the root does not depend on the order the
//! leaves were supplied in. A node left without a sibling is carried up to the next level as is.
//! The empty tree has root [EMPTY_ROOT].

use std::collections::BTreeMap;

use alloy::primitives::{keccak256, Address, B256, U256};

use crate::{
    allocation::DistributionLeaf,
    artifact::{ClaimProof, DistributionArtifact},
    error::DistributionError,
};

/// Root of a tree without leaves.
pub const EMPTY_ROOT: B256 = B256::ZERO;

/// Hash of one `(address, amount)` leaf.
pub fn leaf_hash(address: Address, amount: U256) -> B256 {
    let mut packed = [0u8; 52];
    packed[..20].copy_from_slice(address.as_slice());
    packed[20..].copy_from_slice(&amount.to_be_bytes::<32>());
    keccak256(packed)
}

/// Hash of two sibling nodes, independent of their order.
pub fn node_hash(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut concat = [0u8; 64];
    concat[..32].copy_from_slice(lo.as_slice());
    concat[32..].copy_from_slice(hi.as_slice());
    keccak256(concat)
}

/// Recompute the root from a leaf hash and its proof.
pub fn verify_proof(root: B256, leaf: B256, proof: &[B256]) -> bool {
    proof.iter().fold(leaf, |acc, sibling| node_hash(acc, *sibling)) == root
}

fn next_layer(layer: &[B256]) -> Vec<B256> {
    layer
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => node_hash(*left, *right),
            // Unpaired node moves up unchanged.
            _ => pair[0],
        })
        .collect()
}

/// Full tree keeping every level so proofs can be extracted.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `layers[0]` = sorted leaf hashes, last layer = `[root]`.
    layers: Vec<Vec<B256>>,
}

impl MerkleTree {
    pub fn from_leaf_hashes(mut hashes: Vec<B256>) -> Self {
        if hashes.is_empty() {
            return Self { layers: Vec::new() };
        }
        hashes.sort_unstable();

        let mut layers = vec![hashes];
        while let Some(top) = layers.last().filter(|layer| layer.len() > 1) {
            let next = next_layer(top);
            layers.push(next);
        }
        Self { layers }
    }

    pub fn root(&self) -> B256 {
        self.layers.last().and_then(|layer| layer.first()).copied().unwrap_or(EMPTY_ROOT)
    }

    pub fn leaf_count(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Sibling hashes from `leaf` up to the root, or `None` if the leaf is not in the tree.
    pub fn proof(&self, leaf: B256) -> Option<Vec<B256>> {
        let mut pos = self.layers.first()?.binary_search(&leaf).ok()?;
        let mut proof = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            if let Some(sibling) = layer.get(pos ^ 1) {
                proof.push(*sibling);
            }
            pos /= 2;
        }
        Some(proof)
    }
}

/// Commit to the given leaves and produce the publishable artifact.
///
/// Each address may appear only once, since proofs are published per address.
pub fn commit_leaves(
    leaves: &[DistributionLeaf],
) -> Result<DistributionArtifact, DistributionError> {
    let mut hashes: BTreeMap<Address, (U256, B256)> = BTreeMap::new();
    for leaf in leaves {
        let hash = leaf_hash(leaf.address, leaf.amount);
        if hashes.insert(leaf.address, (leaf.amount, hash)).is_some() {
            return Err(DistributionError::DuplicateLeaf(leaf.address));
        }
    }

    let tree = MerkleTree::from_leaf_hashes(hashes.values().map(|(_, hash)| *hash).collect());
    let root = tree.root();

    let mut proofs = BTreeMap::new();
    for (address, (amount, hash)) in hashes {
        // Every committed leaf hash is in the tree.
        let proof = tree.proof(hash).unwrap_or_default();
        proofs.insert(address, ClaimProof { amount, proof });
    }

    tracing::debug!("Committed {} leaves under root {}", tree.leaf_count(), root);
    Ok(DistributionArtifact { root, proofs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    const ALICE: Address = address!("0x00000000000000000000000000000000000000a1");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");
    const CAROL: Address = address!("0x0000000000000000000000000000000000000ca1");

    fn leaf(address: Address, amount: u64) -> DistributionLeaf {
        DistributionLeaf { address, amount: U256::from(amount) }
    }

    fn assert_all_verify(artifact: &DistributionArtifact) {
        for (address, claim) in &artifact.proofs {
            assert!(
                verify_proof(artifact.root, leaf_hash(*address, claim.amount), &claim.proof),
                "proof of {address} does not reproduce the root"
            );
        }
    }

    #[test]
    fn leaf_hash_matches_packed_encoding() {
        assert_eq!(
            leaf_hash(ALICE, U256::from(100)),
            b256!("0x574ca3e37e6077f6c60d4f50b36fd1accfb703f75214d26d43f0fa87a5797c4c")
        );
    }

    #[test]
    fn empty_tree_has_sentinel_root() {
        let artifact = commit_leaves(&[]).unwrap();
        assert_eq!(artifact.root, EMPTY_ROOT);
        assert!(artifact.proofs.is_empty());
    }

    #[test]
    fn single_leaf_is_the_root() {
        let artifact = commit_leaves(&[leaf(ALICE, 100)]).unwrap();
        assert_eq!(artifact.root, leaf_hash(ALICE, U256::from(100)));
        assert!(artifact.proofs[&ALICE].proof.is_empty());
        assert_all_verify(&artifact);
    }

    #[test]
    fn two_leaves_hash_as_sorted_pair() {
        let artifact = commit_leaves(&[leaf(ALICE, 100), leaf(BOB, 200)]).unwrap();
        assert_eq!(
            artifact.root,
            b256!("0x7a38422a2c0ed29b506ef622d36e6740c6f6aeed0cb4caea0cf04ec43e1d940b")
        );
        assert_eq!(artifact.proofs[&ALICE].proof, vec![leaf_hash(BOB, U256::from(200))]);
        assert_all_verify(&artifact);
    }

    #[test]
    fn odd_leaf_is_promoted() {
        let artifact =
            commit_leaves(&[leaf(ALICE, 100), leaf(BOB, 200), leaf(CAROL, 300)]).unwrap();
        assert_eq!(
            artifact.root,
            b256!("0x88308d587e552bfa54df06aa00e51a5b0cd2bbb5cddb27b79260108e78ddf04e")
        );
        // The promoted leaf skips the bottom level.
        assert_eq!(artifact.proofs[&CAROL].proof.len(), 1);
        assert_eq!(artifact.proofs[&ALICE].proof.len(), 2);
        assert_all_verify(&artifact);
    }

    #[test]
    fn larger_trees_round_trip() {
        for count in 4..=17u64 {
            let leaves: Vec<_> =
                (1..=count).map(|i| leaf(Address::with_last_byte(i as u8), i * 7)).collect();
            let artifact = commit_leaves(&leaves).unwrap();
            assert_eq!(artifact.proofs.len(), count as usize);
            assert_all_verify(&artifact);
        }
    }

    #[test]
    fn root_ignores_leaf_order() {
        let forward = commit_leaves(&[leaf(ALICE, 1), leaf(BOB, 2), leaf(CAROL, 3)]).unwrap();
        let backward = commit_leaves(&[leaf(CAROL, 3), leaf(ALICE, 1), leaf(BOB, 2)]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn wrong_amount_does_not_verify() {
        let artifact = commit_leaves(&[leaf(ALICE, 100), leaf(BOB, 200)]).unwrap();
        let proof = &artifact.proofs[&ALICE].proof;
        assert!(!verify_proof(artifact.root, leaf_hash(ALICE, U256::from(99)), proof));
        assert!(!verify_proof(artifact.root, leaf_hash(CAROL, U256::from(100)), proof));
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let err = commit_leaves(&[leaf(ALICE, 1), leaf(ALICE, 2)]).unwrap_err();
        assert_eq!(err, DistributionError::DuplicateLeaf(ALICE));
    }
}
