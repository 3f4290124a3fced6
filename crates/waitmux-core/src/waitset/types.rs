//! Shared wait-set vocabulary.

use core::sync::atomic::{AtomicU64, Ordering};

/// Stable slot index: a trigger's public identity within one wait-set.
pub type TriggerIndex = u32;

/// Index value never assigned to a trigger.
pub const INVALID_INDEX: TriggerIndex = TriggerIndex::MAX;

/// Trigger id value never generated.
pub const INVALID_ID: u64 = 0;

/// The indices whose triggers fired, as reported by one drain pass.
pub type WakeUpSet = Vec<TriggerIndex>;

/// Trigger ids are monotone and process-global, so a reused slot can never
/// be confused with its previous occupant (the `(index, id)` ABA guard).
pub(crate) fn next_trigger_id() -> u64 {
    static NEXT_TRIGGER_ID: AtomicU64 = AtomicU64::new(1);
    loop {
        let id = NEXT_TRIGGER_ID.fetch_add(1, Ordering::Relaxed);
        if id != INVALID_ID {
            return id;
        }
    }
}
