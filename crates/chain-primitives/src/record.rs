// chain-primitives/src/record.rs

use crate::{BlockHash, TxId};
use serde::{de::DeserializeOwned, Serialize};

/// Interface the storage engine requires of transaction values.
///
/// The engine treats transactions as opaque serializable records; the only
/// structure it relies on is a stable identifier.
pub trait TransactionRecord: Serialize + DeserializeOwned {
    /// Stable identifier of this transaction
    fn id(&self) -> TxId;
}

/// Interface the storage engine requires of block values.
///
/// Blocks are opaque serializable records with a stable cryptographic hash,
/// a height on their chain, and an ordered list of contained transactions.
pub trait BlockRecord: Serialize + DeserializeOwned {
    type Transaction: TransactionRecord;

    /// Stable cryptographic hash of this block
    fn hash(&self) -> BlockHash;

    /// Height of this block on its chain
    fn index(&self) -> u64;

    /// Transactions contained in this block, in order
    fn transactions(&self) -> &[Self::Transaction];
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestTx {
        payload: Vec<u8>,
    }

    impl TransactionRecord for TestTx {
        fn id(&self) -> TxId {
            TxId::digest(&self.payload)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestBlock {
        index: u64,
        transactions: Vec<TestTx>,
    }

    impl BlockRecord for TestBlock {
        type Transaction = TestTx;

        fn hash(&self) -> BlockHash {
            BlockHash::digest(&bincode::serialize(self).unwrap())
        }

        fn index(&self) -> u64 {
            self.index
        }

        fn transactions(&self) -> &[TestTx] {
            &self.transactions
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let block = TestBlock {
            index: 3,
            transactions: vec![TestTx { payload: b"a".to_vec() }],
        };
        let bytes = bincode::serialize(&block).unwrap();
        let decoded: TestBlock = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.transactions()[0].id(), block.transactions[0].id());
    }
}
