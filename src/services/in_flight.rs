//! Busy flags for admin mutations.
//!
//! Each mutating admin operation claims a slot before touching the stores. A
//! second trigger for an occupied slot is refused outright, so a double click
//! cannot upload twice or race an edit against a delete of the same design.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    /// Edit or delete of one design.
    Design(Uuid),
    Reset,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => write!(f, "design upload"),
            Operation::Design(id) => write!(f, "change to design `{}`", id),
            Operation::Reset => write!(f, "response reset"),
        }
    }
}

#[derive(Clone, Default)]
pub struct InFlight {
    slots: Arc<Mutex<HashSet<Operation>>>,
}

impl InFlight {
    /// Claim `op`, or `None` when it is already running.
    pub fn try_claim(&self, op: Operation) -> Option<InFlightGuard> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if !slots.insert(op) {
            return None;
        }
        Some(InFlightGuard {
            slots: Arc::clone(&self.slots),
            op,
        })
    }
}

/// Releases its slot when dropped.
pub struct InFlightGuard {
    slots: Arc<Mutex<HashSet<Operation>>>,
    op: Operation,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_release() {
        let in_flight = InFlight::default();
        let guard = in_flight.try_claim(Operation::Upload).unwrap();
        assert!(in_flight.try_claim(Operation::Upload).is_none());

        drop(guard);
        assert!(in_flight.try_claim(Operation::Upload).is_some());
    }

    #[test]
    fn slots_are_independent() {
        let in_flight = InFlight::default();
        let a = Uuid::new_v4();
        let _upload = in_flight.try_claim(Operation::Upload).unwrap();
        let _design = in_flight.try_claim(Operation::Design(a)).unwrap();

        assert!(in_flight.try_claim(Operation::Design(Uuid::new_v4())).is_some());
        assert!(in_flight.try_claim(Operation::Reset).is_some());
        assert!(in_flight.try_claim(Operation::Design(a)).is_none());
    }

    #[test]
    fn clones_share_slots() {
        let in_flight = InFlight::default();
        let other = in_flight.clone();
        let _guard = in_flight.try_claim(Operation::Reset).unwrap();
        assert!(other.try_claim(Operation::Reset).is_none());
    }
}
