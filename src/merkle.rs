use crate::*;
use sha2::{Digest, Sha256};

/// Hash one tree level's pair, sorting the two nodes first so verification
/// is independent of left/right orientation at construction time.
pub fn hash_pair(a: &Hash256, b: &Hash256) -> Hash256 {
    let (lo, hi) = if a.as_bytes() <= b.as_bytes() {
        (a, b)
    } else {
        (b, a)
    };

    let mut hasher = Sha256::new();
    hasher.update(lo.as_bytes());
    hasher.update(hi.as_bytes());
    Hash256::new(hasher.finalize().into())
}

/// Recompute the path bottom-up and compare the final accumulator against
/// the expected root.
pub fn verify_path(root: &Hash256, leaf: &Hash256, siblings: &[Hash256]) -> bool {
    let mut accumulator = *leaf;
    for sibling in siblings {
        accumulator = hash_pair(&accumulator, sibling);
    }
    accumulator == *root
}

/// An inclusion proof: the ordered sibling hashes plus the direction bit of
/// the proven node at each level (true = right child).
///
/// Verification only needs the siblings; the direction bits exist for the
/// proving circuit, which hashes ordered pairs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Hash256,
    pub siblings: Vec<Hash256>,
    pub directions: Vec<bool>,
}

/// A Merkle tree over the eligibility leaf set.
///
/// A level with an odd node count carries its last node up unchanged; that
/// node contributes no sibling at that level.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash256>>,
}

impl MerkleTree {
    pub fn build(leaves: &[Hash256]) -> Result<Self, Error> {
        if leaves.is_empty() {
            return Err(Error::InvalidInput("merkle tree needs at least one leaf"));
        }

        let mut levels = vec![leaves.to_vec()];
        while levels[levels.len() - 1].len() > 1 {
            let previous = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity((previous.len() + 1) / 2);
            for pair in previous.chunks(2) {
                if pair.len() == 2 {
                    next.push(hash_pair(&pair[0], &pair[1]));
                } else {
                    next.push(pair[0]);
                }
            }
            levels.push(next);
        }

        Ok(MerkleTree { levels })
    }

    pub fn root(&self) -> Hash256 {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Build the inclusion proof for a leaf, or None if the leaf is not in
    /// the tree.
    pub fn prove(&self, leaf: &Hash256) -> Option<MerkleProof> {
        let mut index = self.levels[0].iter().position(|l| l == leaf)?;

        let mut siblings = Vec::new();
        let mut directions = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = index ^ 1;
            if let Some(sibling) = level.get(sibling_index) {
                siblings.push(*sibling);
                directions.push(index & 1 == 1);
            }
            index /= 2;
        }

        Some(MerkleProof {
            leaf: *leaf,
            siblings,
            directions,
        })
    }
}
