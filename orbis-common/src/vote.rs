use serde::{Deserialize, Serialize};

use crate::utils::NodeId;

/// A vote on a proposed block, as carried by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteData {
    pub block_hash: String,
    pub approve: bool,
    pub voter: NodeId,
    #[serde(default)]
    pub term: u64,
    #[serde(with = "hex::serde")]
    pub signature: [u8; 64],
    pub public_key: Vec<u8>,
}

#[derive(Serialize)]
struct VoteSignView<'a> {
    block_hash: &'a str,
    approve: bool,
    voter: &'a NodeId,
    term: u64,
}

/// Canonical bytes covered by the vote signature. Always use the same
/// encoding on both sides.
pub fn vote_signing_bytes(v: &VoteData) -> Vec<u8> {
    bincode::serialize(&VoteSignView {
        block_hash: &v.block_hash,
        approve: v.approve,
        voter: &v.voter,
        term: v.term,
    })
    .expect("serialize vote sign view")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_bytes_cover_approve_flag() {
        let base = VoteData {
            block_hash: "abc".into(),
            approve: true,
            voter: NodeId::new("node-1"),
            term: 3,
            signature: [0u8; 64],
            public_key: vec![0; 32],
        };
        let mut flipped = base.clone();
        flipped.approve = false;

        assert_ne!(vote_signing_bytes(&base), vote_signing_bytes(&flipped));
    }
}
