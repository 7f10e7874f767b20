//! Inner orphan pool state protected by RwLock.
//!
//! All policy decisions happen here: admission checks, the two-phase
//! eviction of [`limit_orphans`](Inner::limit_orphans), peer and block
//! cleanup, and child discovery. Traversals that remove entries collect
//! the victim ids first and erase in a second pass, so no removal ever
//! invalidates a live iterator.

use crate::arena::OrphanArena;
use crate::types::{AddOrphanError, RemovalReason};
use crate::{OrphanageOptions, PeerId};
use bitcoin::{Block, OutPoint, Transaction, Txid};
use std::collections::HashSet;
use std::sync::Arc;

/// Inner orphan pool state (protected by RwLock in [`TxOrphanage`](crate::TxOrphanage)).
#[derive(Debug)]
pub(crate) struct Inner {
    /// Arena-based entry storage with multi-index support.
    pub(crate) arena: OrphanArena,

    /// Deadline gating the next expiration sweep, in seconds since the Unix
    /// epoch. Starts in the past so the first `limit_orphans` call sweeps.
    pub(crate) next_sweep: u64,

    /// Victim selection for overflow eviction.
    rng: fastrand::Rng,
}

impl Inner {
    pub(crate) fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            arena: OrphanArena::new(),
            next_sweep: 0,
            rng,
        }
    }

    /// Admit a new orphan received from `peer`.
    pub(crate) fn add_tx(
        &mut self,
        tx: Arc<Transaction>,
        peer: PeerId,
        expires_at: u64,
        max_orphan_tx_size: usize,
    ) -> Result<(), AddOrphanError> {
        let txid = tx.compute_txid();
        if self.arena.contains(&txid) {
            return Err(AddOrphanError::AlreadyInPool);
        }

        let size = tx.total_size();
        if size > max_orphan_tx_size {
            tracing::debug!("Ignoring large orphan tx {txid} (size: {size})");
            return Err(AddOrphanError::OversizeTx {
                size,
                max: max_orphan_tx_size,
            });
        }

        self.arena.insert(tx, txid, peer, expires_at);

        tracing::debug!(
            "Stored orphan tx {txid} (pool size: {}, outpoints: {})",
            self.arena.len(),
            self.arena.prevout_count(),
        );
        Ok(())
    }

    /// Erase a single orphan by id. Returns the number of entries erased
    /// (0 or 1).
    pub(crate) fn erase_tx(&mut self, txid: &Txid, reason: RemovalReason) -> usize {
        match self.arena.get_by_txid(txid).and_then(|id| self.arena.remove(id)) {
            Some(_) => {
                tracing::trace!("Removed orphan tx {txid} ({})", reason.as_str());
                1
            }
            None => 0,
        }
    }

    /// Erase every orphan supplied by `peer`. Returns the number erased.
    pub(crate) fn erase_for_peer(&mut self, peer: PeerId) -> usize {
        let to_erase: Vec<Txid> = self
            .arena
            .iter()
            .filter(|(_, entry)| entry.from_peer == peer)
            .map(|(_, entry)| entry.txid)
            .collect();

        let mut erased = 0;
        for txid in &to_erase {
            erased += self.erase_tx(txid, RemovalReason::Peer);
        }
        if erased > 0 {
            tracing::debug!(
                reason = RemovalReason::Peer.as_str(),
                "Erased {erased} orphan tx from peer={peer}"
            );
        }
        erased
    }

    /// Erase every orphan whose inputs are spent by a transaction in
    /// `block`.
    ///
    /// This removes both orphans whose parents were just confirmed and
    /// orphans that double-spend inputs consumed by the block. Victims are
    /// collected across the whole block before the first erasure, since
    /// erasing mutates the reverse index being read.
    pub(crate) fn erase_for_block(&mut self, block: &Block) -> usize {
        let mut to_erase: Vec<Txid> = Vec::new();

        for tx in &block.txdata {
            for txin in &tx.input {
                let Some(bucket) = self.arena.children_of(&txin.previous_output) else {
                    continue;
                };
                for id in bucket {
                    if let Some(entry) = self.arena.get(*id) {
                        to_erase.push(entry.txid);
                    }
                }
            }
        }

        let mut erased = 0;
        for txid in &to_erase {
            erased += self.erase_tx(txid, RemovalReason::Block);
        }
        if erased > 0 {
            tracing::debug!(
                reason = RemovalReason::Block.as_str(),
                "Erased {erased} orphan tx included or conflicted by block"
            );
        }
        erased
    }

    /// Enforce the orphan count cap, sweeping out expired entries first.
    ///
    /// The sweep runs at most once per sweep interval and erases every
    /// orphan whose deadline has passed; its erasures are not counted in
    /// the returned value. Overflow eviction then removes uniformly random
    /// victims until at most `max_orphans` remain and returns the number
    /// evicted.
    pub(crate) fn limit_orphans(
        &mut self,
        max_orphans: usize,
        now: u64,
        options: &OrphanageOptions,
    ) -> usize {
        if self.next_sweep <= now {
            let expire_secs = options.expire_after.as_secs();
            let interval_secs = options.sweep_interval.as_secs();

            let mut min_expires_at = (now + expire_secs).saturating_sub(interval_secs);
            let mut expired: Vec<Txid> = Vec::new();
            for (_, entry) in self.arena.iter() {
                if entry.expires_at <= now {
                    expired.push(entry.txid);
                } else {
                    min_expires_at = min_expires_at.min(entry.expires_at);
                }
            }

            let mut erased = 0;
            for txid in &expired {
                erased += self.erase_tx(txid, RemovalReason::Expired);
            }
            // Sweep again no earlier than one interval after the next entry
            // expires, batching the linear scan.
            self.next_sweep = min_expires_at + interval_secs;
            if erased > 0 {
                tracing::debug!(
                    reason = RemovalReason::Expired.as_str(),
                    "Erased {erased} orphan tx due to expiration"
                );
            }
        }

        let mut evicted = 0;
        while self.arena.len() > max_orphans {
            let Some(victim) = self.arena.txid_at(self.rng.usize(..self.arena.len())) else {
                break;
            };
            evicted += self.erase_tx(&victim, RemovalReason::SizeLimit);
        }
        if evicted > 0 {
            tracing::debug!(
                reason = RemovalReason::SizeLimit.as_str(),
                "Evicted {evicted} random orphan tx over the pool limit"
            );
        }
        evicted
    }

    /// Collect the ids of all orphans waiting on an output of `tx` into
    /// `work_set`.
    pub(crate) fn add_children_to_work_set(
        &self,
        tx: &Transaction,
        work_set: &mut HashSet<Txid>,
    ) {
        let txid = tx.compute_txid();
        for vout in 0..tx.output.len() as u32 {
            let Some(bucket) = self.arena.children_of(&OutPoint::new(txid, vout)) else {
                continue;
            };
            for id in bucket {
                if let Some(entry) = self.arena.get(*id) {
                    work_set.insert(entry.txid);
                }
            }
        }
    }

    /// Lookup an orphan, returning the transaction and its source peer.
    pub(crate) fn get_tx(&self, txid: &Txid) -> Option<(Arc<Transaction>, PeerId)> {
        let id = self.arena.get_by_txid(txid)?;
        self.arena
            .get(id)
            .map(|entry| (entry.tx.clone(), entry.from_peer))
    }

    pub(crate) fn have_tx(&self, txid: &Txid) -> bool {
        self.arena.contains(txid)
    }
}
