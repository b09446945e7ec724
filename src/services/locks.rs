use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Per-service advisory locks. Admission holds the lock of its service from
/// the overlap query through the insert, so two bookers of the same service
/// never both see a free slot. Bookings for different services do not
/// contend.
///
/// Entries are never evicted. Callers only ask for the lock of a service that
/// exists and is bookable, so the table grows with the number of services,
/// not with requests.
#[derive(Default)]
pub struct ServiceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ServiceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, service_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(service_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Acquire a handle from [`ServiceLocks::handle`]. The guarded data is `()`,
/// so a poisoned lock carries no broken state and is reclaimed.
pub fn acquire(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}
