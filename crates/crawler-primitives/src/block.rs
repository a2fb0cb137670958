use bitcoin::{block::Header, BlockHash, Txid};
use serde::{Deserialize, Serialize};

/// A block reduced to the fields the network aggregate is allowed to
/// persist. Never carries the full transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightBlock {
    pub height: u64,
    pub hash: BlockHash,
    pub previousblockhash: BlockHash,
    pub merkleroot: bitcoin::TxMerkleNode,
    pub tx: Vec<Txid>,
}

impl LightBlock {
    pub fn from_full(full: &FullBlock) -> Self {
        Self {
            height: full.height,
            hash: full.block.block_hash(),
            previousblockhash: full.block.header.prev_blockhash,
            merkleroot: full.block.header.merkle_root,
            tx: full.block.txdata.iter().map(|tx| tx.compute_txid()).collect(),
        }
    }
}

/// The full block as fetched from the node, handed transiently to user
/// models for the duration of a single `processBlock` call. Callers only
/// ever see `&FullBlock`; nothing in this crate exposes a mutable view.
#[derive(Debug, Clone)]
pub struct FullBlock {
    pub height: u64,
    pub block: bitcoin::Block,
}

impl FullBlock {
    pub fn new(height: u64, block: bitcoin::Block) -> Self {
        Self { height, block }
    }

    pub fn header(&self) -> &Header {
        &self.block.header
    }

    pub fn block_hash(&self) -> BlockHash {
        self.block.block_hash()
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{blockdata::constants::genesis_block, Network};

    use super::*;

    #[test]
    fn light_block_projects_only_the_stable_fields() {
        let block = genesis_block(Network::Regtest);
        let full = FullBlock::new(0, block.clone());
        let light = LightBlock::from_full(&full);

        assert_eq!(light.height, 0);
        assert_eq!(light.hash, block.block_hash());
        assert_eq!(light.previousblockhash, block.header.prev_blockhash);
        assert_eq!(light.tx.len(), block.txdata.len());
    }

    #[test]
    fn full_block_exposes_an_immutable_view() {
        let block = genesis_block(Network::Regtest);
        let full = FullBlock::new(0, block);
        assert_eq!(full.header().version, full.block.header.version);
    }
}
