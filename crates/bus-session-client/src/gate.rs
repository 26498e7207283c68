//! Single-acquire gate guarding session joins.

use std::sync::atomic::{AtomicBool, Ordering};

/// Binary mutual-exclusion flag.
///
/// `try_acquire` never blocks: a caller that loses the race gets `None` and
/// is expected to give up. The returned guard releases on drop, so every exit
/// path releases.
#[derive(Debug, Default)]
pub struct JoinGate {
    held: AtomicBool,
}

impl JoinGate {
    /// Create an open gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Acquire the gate if nobody holds it.
    #[must_use]
    pub fn try_acquire(&self) -> Option<JoinGateGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JoinGateGuard { gate: self })
    }

    /// Whether someone currently holds the gate.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Holds the gate until dropped.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct JoinGateGuard<'a> {
    gate: &'a JoinGate,
}

impl Drop for JoinGateGuard<'_> {
    fn drop(&mut self) {
        self.gate.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let gate = JoinGate::new();

        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_held());
        assert!(gate.try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_held());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_early_return() {
        fn early(gate: &JoinGate) -> bool {
            let Some(_guard) = gate.try_acquire() else {
                return false;
            };
            true
        }

        let gate = JoinGate::new();
        assert!(early(&gate));
        assert!(early(&gate));
        assert!(!gate.is_held());
    }

    #[test]
    fn test_only_one_thread_wins() {
        let gate = Arc::new(JoinGate::new());
        let barrier = Arc::new(Barrier::new(8));
        let winners = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Barrier::new(8));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let (gate, barrier, winners, release) = (
                    Arc::clone(&gate),
                    Arc::clone(&barrier),
                    Arc::clone(&winners),
                    Arc::clone(&release),
                );
                std::thread::spawn(move || {
                    barrier.wait();
                    let guard = gate.try_acquire();
                    if guard.is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                    // Hold until every thread has tried.
                    release.wait();
                    drop(guard);
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(!gate.is_held());
    }
}
