//! # Orphan Transaction Pool
//!
//! This crate provides a bounded, in-memory cache for transactions received
//! from peers whose parent transactions are not yet known to the local node.
//! When a parent later arrives, either in a connected block or through
//! mempool acceptance, the pool surfaces all children waiting on it so the
//! validation driver can re-attempt them.
//!
//! ## Storage
//!
//! Orphans live in a handle-based arena with three coordinated indices: a
//! transaction id map, a reverse index from each referenced parent outpoint
//! to the children waiting on it, and a dense positional list used for O(1)
//! random victim selection. The indices agree on residency before and after
//! every public operation.
//!
//! ## Eviction
//!
//! [`TxOrphanage::limit_orphans`] combines two regimes:
//!
//! - **Expiration sweeps**: orphans older than
//!   [`ORPHAN_TX_EXPIRE_TIME`] are removed by a linear scan that runs at
//!   most once per [`ORPHAN_TX_EXPIRE_INTERVAL`].
//!
//! - **Overflow eviction**: while the pool holds more orphans than the
//!   caller's cap, uniformly random victims are removed. Random selection
//!   keeps an adversarial peer from protecting its own transactions; no
//!   per-peer quota is enforced at admission.
//!
//! Orphans are also removed when their source peer disconnects
//! ([`TxOrphanage::erase_for_peer`]) and when a block connects
//! ([`TxOrphanage::erase_for_block`]).
//!
//! The pool performs no validation of the transactions it holds and nothing
//! is persisted across restarts.

mod arena;
mod clock;
mod inner;
mod options;
mod types;

use self::inner::Inner;
use self::types::RemovalReason;
use bitcoin::{Block, Transaction, Txid};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

pub use self::clock::{Clock, ClockFn};
pub use self::options::{
    OrphanageOptions, OrphanageOptionsBuilder, MAX_STANDARD_TX_SIZE, ORPHAN_TX_EXPIRE_INTERVAL,
    ORPHAN_TX_EXPIRE_TIME,
};
pub use self::types::AddOrphanError;

/// Identifies the peer a transaction was received from.
pub type PeerId = i64;

/// Thread-safe pool of orphan transactions.
///
/// All operations are linearizable with respect to the internal lock;
/// read-only queries take a shared lock and may run concurrently.
#[derive(Debug)]
pub struct TxOrphanage {
    inner: RwLock<Inner>,
    options: OrphanageOptions,
    clock: Clock,
}

impl TxOrphanage {
    /// Constructs a new empty pool.
    pub fn new(options: OrphanageOptions, clock: Clock) -> Self {
        Self::with_rng(options, clock, fastrand::Rng::new())
    }

    /// Constructs a new empty pool drawing eviction victims from the given
    /// RNG.
    ///
    /// A seeded RNG makes overflow victim selection deterministic, which
    /// tests rely on.
    pub fn with_rng(options: OrphanageOptions, clock: Clock, rng: fastrand::Rng) -> Self {
        Self {
            inner: RwLock::new(Inner::with_rng(rng)),
            options,
            clock,
        }
    }

    /// Admit a new orphan received from `peer`.
    ///
    /// The transaction is rejected without any state change if it is already
    /// resident or if its serialized size exceeds the configured maximum.
    pub fn add_tx(&self, tx: Arc<Transaction>, peer: PeerId) -> Result<(), AddOrphanError> {
        let expires_at = self.clock.now().as_secs() + self.options.expire_after.as_secs();
        self.inner
            .write()
            .add_tx(tx, peer, expires_at, self.options.max_orphan_tx_size)
    }

    /// Erase an orphan by id. Returns the number of entries erased (0 or 1).
    pub fn erase_tx(&self, txid: &Txid) -> usize {
        self.inner.write().erase_tx(txid, RemovalReason::Requested)
    }

    /// Erase every orphan supplied by `peer`. Returns the number erased.
    pub fn erase_for_peer(&self, peer: PeerId) -> usize {
        self.inner.write().erase_for_peer(peer)
    }

    /// Erase every orphan whose inputs are spent by a transaction in
    /// `block`, covering both orphans whose parents were just confirmed and
    /// orphans conflicting with the block. Returns the number erased.
    pub fn erase_for_block(&self, block: &Block) -> usize {
        self.inner.write().erase_for_block(block)
    }

    /// Enforce the orphan count cap.
    ///
    /// Expired orphans are swept out first (at most once per sweep
    /// interval), then uniformly random victims are evicted until at most
    /// `max_orphans` remain. Returns the number of overflow evictions;
    /// expiration erasures are not counted.
    pub fn limit_orphans(&self, max_orphans: usize) -> usize {
        let now = self.clock.now().as_secs();
        self.inner
            .write()
            .limit_orphans(max_orphans, now, &self.options)
    }

    /// Collect the ids of all orphans waiting on an output of `tx` into
    /// `work_set`.
    ///
    /// The work set is additive; existing entries are kept.
    pub fn add_children_to_work_set(&self, tx: &Transaction, work_set: &mut HashSet<Txid>) {
        self.inner.read().add_children_to_work_set(tx, work_set)
    }

    /// Whether an orphan with the given id is resident.
    pub fn have_tx(&self, txid: &Txid) -> bool {
        self.inner.read().have_tx(txid)
    }

    /// Lookup an orphan, returning the transaction and its source peer.
    pub fn get_tx(&self, txid: &Txid) -> Option<(Arc<Transaction>, PeerId)> {
        self.inner.read().get_tx(txid)
    }

    /// Number of resident orphans.
    pub fn len(&self) -> usize {
        self.inner.read().arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().arena.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&Inner) -> R) -> R {
        f(&self.inner.read())
    }
}

impl Default for TxOrphanage {
    fn default() -> Self {
        Self::new(OrphanageOptions::default(), Clock::default())
    }
}
