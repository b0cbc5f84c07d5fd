//! Request sequencer: the stale-response guard.
//!
//! Each logical slot carries a monotonically increasing sequence. An
//! operation captures a [`SlotTicket`] when it starts and may only mutate
//! visible state if its ticket is still current when it settles.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use strum_macros::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SlotId {
    /// Aggregate dashboard resolution.
    Dashboard,
    /// Paginated article list.
    Articles,
    /// Background volatile refresh.
    Poll,
}

/// Sequence captured when an operation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTicket {
    slot: SlotId,
    sequence: u64,
}

impl SlotTicket {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Debug)]
pub struct RequestSlot {
    id: SlotId,
    sequence: AtomicU64,
}

impl RequestSlot {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Start a new operation, superseding every earlier one.
    pub fn begin(&self) -> SlotTicket {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(slot = %self.id, sequence, "slot sequence advanced");
        SlotTicket {
            slot: self.id,
            sequence,
        }
    }

    pub fn current(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Whether `ticket` still belongs to the latest operation.
    pub fn is_current(&self, ticket: &SlotTicket) -> bool {
        ticket.slot == self.id && ticket.sequence == self.current()
    }

    /// Supersede whatever is in flight without starting anything new.
    pub fn invalidate(&self) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
    }
}
