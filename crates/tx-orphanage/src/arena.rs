//! Arena-based orphan storage with multi-index support.
//!
//! The arena uses SlotMap for handle-based entry storage. Three indices are
//! kept in lockstep with it: a transaction id lookup map, a reverse index
//! from each referenced parent outpoint to the set of children waiting on
//! it, and a dense positional list used to draw a uniform random eviction
//! victim in O(1). [`OrphanArena::remove`] is the sole place where reverse
//! index cleanup and list compaction happen; every removal path goes
//! through it.

use crate::types::OrphanId;
use crate::PeerId;
use bitcoin::{OutPoint, Transaction, Txid};
use slotmap::{DefaultKey, SlotMap};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A resident orphan transaction.
///
/// Immutable after admission except for `list_pos`, which the arena updates
/// when compacting the positional list.
#[derive(Debug)]
pub(crate) struct OrphanEntry {
    /// Transaction data.
    pub(crate) tx: Arc<Transaction>,

    /// Cached id of `tx`.
    pub(crate) txid: Txid,

    /// Peer that supplied the orphan.
    pub(crate) from_peer: PeerId,

    /// Absolute expiration deadline, in seconds since the Unix epoch.
    pub(crate) expires_at: u64,

    /// Current index of this entry in the positional list.
    pub(crate) list_pos: usize,
}

/// Multi-indexed storage for orphan transactions.
#[derive(Debug)]
pub(crate) struct OrphanArena {
    /// Primary storage: handle -> entry. An orphan is resident iff it has an
    /// entry here.
    pub(crate) entries: SlotMap<DefaultKey, OrphanEntry>,

    /// Index by transaction id.
    pub(crate) by_txid: HashMap<Txid, OrphanId>,

    /// Reverse index: parent outpoint -> children referencing it.
    ///
    /// Buckets are never empty; the last removal of a child deletes the
    /// bucket.
    pub(crate) by_prevout: HashMap<OutPoint, HashSet<OrphanId>>,

    /// Dense list of handles for random victim selection. Its ordering has
    /// no meaning; `entries[list[i]].list_pos == i` for every position.
    pub(crate) list: Vec<OrphanId>,
}

impl OrphanArena {
    pub(crate) fn new() -> Self {
        Self {
            entries: SlotMap::new(),
            by_txid: HashMap::new(),
            by_prevout: HashMap::new(),
            list: Vec::new(),
        }
    }

    /// Number of resident orphans.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct parent outpoints currently indexed.
    pub(crate) fn prevout_count(&self) -> usize {
        self.by_prevout.len()
    }

    pub(crate) fn contains(&self, txid: &Txid) -> bool {
        self.by_txid.contains_key(txid)
    }

    /// Get entry by handle.
    pub(crate) fn get(&self, id: OrphanId) -> Option<&OrphanEntry> {
        self.entries.get(id.0)
    }

    /// Lookup handle by transaction id.
    pub(crate) fn get_by_txid(&self, txid: &Txid) -> Option<OrphanId> {
        self.by_txid.get(txid).copied()
    }

    /// Transaction id of the orphan at the given position in the dense list.
    pub(crate) fn txid_at(&self, pos: usize) -> Option<Txid> {
        let id = self.list.get(pos)?;
        self.entries.get(id.0).map(|entry| entry.txid)
    }

    /// Children waiting on the given parent outpoint.
    pub(crate) fn children_of(&self, outpoint: &OutPoint) -> Option<&HashSet<OrphanId>> {
        self.by_prevout.get(outpoint)
    }

    /// Iterate all resident orphans in arbitrary order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (OrphanId, &OrphanEntry)> {
        self.entries.iter().map(|(key, entry)| (OrphanId(key), entry))
    }

    /// Insert a new orphan and index it under every input outpoint.
    ///
    /// The caller must have checked that `txid` is not already resident.
    pub(crate) fn insert(
        &mut self,
        tx: Arc<Transaction>,
        txid: Txid,
        from_peer: PeerId,
        expires_at: u64,
    ) -> OrphanId {
        let entry = OrphanEntry {
            tx,
            txid,
            from_peer,
            expires_at,
            list_pos: self.list.len(),
        };
        let id = OrphanId(self.entries.insert(entry));
        self.list.push(id);
        self.by_txid.insert(txid, id);

        let entry = &self.entries[id.0];
        for txin in &entry.tx.input {
            self.by_prevout
                .entry(txin.previous_output)
                .or_default()
                .insert(id);
        }

        id
    }

    /// Remove an orphan, unindexing it from every input outpoint and keeping
    /// the positional list dense.
    ///
    /// Returns the removed entry if it existed.
    pub(crate) fn remove(&mut self, id: OrphanId) -> Option<OrphanEntry> {
        let entry = self.entries.remove(id.0)?;

        self.by_txid.remove(&entry.txid);

        for txin in &entry.tx.input {
            if let Some(bucket) = self.by_prevout.get_mut(&txin.previous_output) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.by_prevout.remove(&txin.previous_output);
                }
            }
        }

        let old_pos = entry.list_pos;
        debug_assert_eq!(self.list[old_pos], id);
        if let Some(last_id) = self.list.pop() {
            if old_pos < self.list.len() {
                // Move the previously-last entry into the vacated position.
                self.list[old_pos] = last_id;
                self.entries[last_id.0].list_pos = old_pos;
            }
        }

        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{absolute, transaction, Amount, ScriptBuf, Sequence, TxIn, TxOut, Witness};

    fn outpoint(n: u8, vout: u32) -> OutPoint {
        OutPoint::new(Txid::from_byte_array([n; 32]), vout)
    }

    fn tx_spending(prevouts: &[OutPoint]) -> Arc<Transaction> {
        Arc::new(Transaction {
            version: transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: prevouts
                .iter()
                .map(|prevout| TxIn {
                    previous_output: *prevout,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: ScriptBuf::new(),
            }],
        })
    }

    fn insert(arena: &mut OrphanArena, tx: Arc<Transaction>) -> (Txid, OrphanId) {
        let txid = tx.compute_txid();
        let id = arena.insert(tx, txid, 0, 0);
        (txid, id)
    }

    #[test]
    fn insert_populates_all_indices() {
        let mut arena = OrphanArena::new();
        let (txid, id) = insert(&mut arena, tx_spending(&[outpoint(1, 0), outpoint(2, 3)]));

        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get_by_txid(&txid), Some(id));
        assert_eq!(arena.txid_at(0), Some(txid));
        assert_eq!(arena.get(id).map(|e| e.list_pos), Some(0));
        assert!(arena.children_of(&outpoint(1, 0)).is_some_and(|b| b.contains(&id)));
        assert!(arena.children_of(&outpoint(2, 3)).is_some_and(|b| b.contains(&id)));
        assert_eq!(arena.prevout_count(), 2);
    }

    #[test]
    fn remove_drops_empty_buckets_only() {
        let mut arena = OrphanArena::new();
        let shared = outpoint(1, 0);
        let (_, a) = insert(&mut arena, tx_spending(&[shared]));
        let (_, b) = insert(&mut arena, tx_spending(&[shared, outpoint(2, 0)]));

        assert!(arena.remove(a).is_some());
        let bucket = arena.children_of(&shared).expect("bucket survives");
        assert!(bucket.contains(&b));
        assert!(!bucket.contains(&a));
        assert!(arena.children_of(&outpoint(2, 0)).is_some());

        assert!(arena.remove(b).is_some());
        assert!(arena.children_of(&shared).is_none());
        assert_eq!(arena.prevout_count(), 0);
        assert!(arena.is_empty());
    }

    #[test]
    fn remove_compacts_positional_list() {
        let mut arena = OrphanArena::new();
        let (_, a) = insert(&mut arena, tx_spending(&[outpoint(1, 0)]));
        let (txid_b, b) = insert(&mut arena, tx_spending(&[outpoint(2, 0)]));
        let (txid_c, c) = insert(&mut arena, tx_spending(&[outpoint(3, 0)]));

        // Removing the first entry moves the last one into its slot.
        assert!(arena.remove(a).is_some());
        assert_eq!(arena.list.len(), 2);
        assert_eq!(arena.txid_at(0), Some(txid_c));
        assert_eq!(arena.get(c).map(|e| e.list_pos), Some(0));
        assert_eq!(arena.get(b).map(|e| e.list_pos), Some(1));

        // Removing the last entry is a plain pop.
        assert!(arena.remove(b).is_some());
        assert_eq!(arena.list.len(), 1);
        assert_eq!(arena.txid_at(0), Some(txid_c));
        assert_eq!(arena.get(c).map(|e| e.list_pos), Some(0));
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut arena = OrphanArena::new();
        let (_, a) = insert(&mut arena, tx_spending(&[outpoint(1, 0)]));
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn duplicate_inputs_index_once() {
        let mut arena = OrphanArena::new();
        let shared = outpoint(7, 1);
        let (_, id) = insert(&mut arena, tx_spending(&[shared, shared]));

        assert_eq!(arena.children_of(&shared).map(|b| b.len()), Some(1));
        assert!(arena.remove(id).is_some());
        assert!(arena.children_of(&shared).is_none());
    }
}
