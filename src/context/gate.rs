use crate::utils::lock;
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Reentered;

#[derive(Debug, Default)]
struct Holder {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Entry gate for one execution context.
///
/// Admits one thread at a time; others wait on the condvar. A re-entrant gate
/// lets the holding thread nest entries, an exclusive one reports it.
#[derive(Debug)]
pub(crate) struct Gate {
    reentrant: bool,
    holder: Mutex<Holder>,
    released: Condvar,
}

impl Gate {
    pub(crate) fn exclusive() -> Self {
        Self::with_mode(false)
    }

    pub(crate) fn reentrant() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(reentrant: bool) -> Self {
        Self {
            reentrant,
            holder: Mutex::new(Holder::default()),
            released: Condvar::new(),
        }
    }

    /// Block until the calling thread holds the gate.
    pub(crate) fn enter(&self) -> Result<ThreadId, Reentered> {
        let me = thread::current().id();
        let mut holder = lock(&self.holder);
        loop {
            match holder.owner {
                None => {
                    holder.owner = Some(me);
                    holder.depth = 1;
                    return Ok(me);
                }
                Some(owner) if owner == me => {
                    if !self.reentrant {
                        return Err(Reentered);
                    }
                    holder.depth += 1;
                    return Ok(me);
                }
                Some(_) => {
                    holder = self
                        .released
                        .wait(holder)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Release one level of entry made by `owner`.
    pub(crate) fn leave(&self, owner: ThreadId) {
        let mut holder = lock(&self.holder);
        if holder.owner != Some(owner) {
            return;
        }
        holder.depth = holder.depth.saturating_sub(1);
        if holder.depth == 0 {
            holder.owner = None;
            self.released.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_exclusive_gate_rejects_nesting() {
        let gate = Gate::exclusive();
        let owner = gate.enter().unwrap();
        assert_eq!(gate.enter(), Err(Reentered));
        gate.leave(owner);
        assert!(gate.enter().is_ok());
    }

    #[test]
    fn test_reentrant_gate_counts_depth() {
        let gate = Arc::new(Gate::reentrant());
        let owner = gate.enter().unwrap();
        gate.enter().unwrap();
        gate.leave(owner);

        // Still held after one leave: another thread must wait.
        let other = gate.clone();
        let waiter = thread::spawn(move || {
            let id = other.enter().unwrap();
            other.leave(id);
        });
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        gate.leave(owner);
        waiter.join().unwrap();
    }

    #[test]
    fn test_gate_serializes_threads() {
        let gate = Arc::new(Gate::exclusive());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let inside = inside.clone();
                let overlaps = overlaps.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let owner = gate.enter().unwrap();
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                        gate.leave(owner);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
