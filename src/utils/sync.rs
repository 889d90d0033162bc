use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Handler panics are contained by the request bridge, so a poisoned lock only
/// means some earlier request failed; the protected state is still coherent
/// because none of the host's critical sections call into handler code.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
