//! Core type definitions for the orphan pool.

use slotmap::DefaultKey;

/// Handle to an entry in the orphan arena (not an iterator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrphanId(pub(crate) DefaultKey);

/// Why a transaction was not admitted to the orphan pool.
///
/// Admission failures never change pool state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AddOrphanError {
    #[error("transaction already in orphan pool")]
    AlreadyInPool,

    /// Large orphans are refused outright so that the worst-case memory held
    /// by the pool stays bounded by `cap * max_orphan_tx_size`. A peer with a
    /// legitimate large transaction is expected to rebroadcast it once the
    /// missing parents have been mined or received.
    #[error("orphan tx too large (size: {size}, max: {max})")]
    OversizeTx { size: usize, max: usize },
}

/// Why an orphan was removed from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Expiration deadline passed.
    Expired,

    /// Random eviction while the pool exceeded its cap.
    SizeLimit,

    /// Inputs spent by a transaction in a connected block.
    Block,

    /// Source peer disconnected.
    Peer,

    /// Explicitly erased by the caller.
    Requested,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::SizeLimit => "sizelimit",
            Self::Block => "block",
            Self::Peer => "peer",
            Self::Requested => "requested",
        }
    }
}
