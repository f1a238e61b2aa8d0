use std::time::Duration;

use tokio::task::JoinHandle;

/// A one-shot timer task together with the generation it was armed under.
struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Holds at most one outstanding timer.
///
/// Arming replaces (and aborts) whatever was armed before. A timer task that
/// wakes up after being cleared or replaced finds its generation stale and
/// must not act, which covers the window where the task already left its
/// sleep but has not yet acquired the owner's lock.
#[derive(Default)]
pub(crate) struct TimerSlot {
    armed: Option<ArmedTimer>,
    generation: u64,
}

impl TimerSlot {
    /// Spawns a task that sleeps for `delay` and then calls `on_fire` with the
    /// generation of this arming. Must be called from within a Tokio runtime.
    pub(crate) fn arm<F>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.clear();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            on_fire(generation);
        });
        self.armed = Some(ArmedTimer { generation, handle });
        generation
    }

    /// Aborts the armed timer, if any. Returns whether one was armed.
    pub(crate) fn clear(&mut self) -> bool {
        match self.armed.take() {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.armed
            .as_ref()
            .is_some_and(|timer| timer.generation == generation)
    }

    /// Called from a firing timer: forgets the armed timer if it is still the
    /// one identified by `generation`. Returns false for a stale wake-up.
    pub(crate) fn disarm_if_current(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            // the handle belongs to the running task itself; dropping detaches it
            self.armed = None;
            true
        } else {
            false
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_timer() {
        let fired = Arc::new(AtomicU32::new(0));
        let slot = Arc::new(Mutex::new(TimerSlot::default()));

        for _ in 0..2 {
            let fired = Arc::clone(&fired);
            let owner = Arc::clone(&slot);
            slot.lock().unwrap().arm(Duration::from_millis(10), move |generation| {
                if owner.lock().unwrap().disarm_if_current(generation) {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!slot.lock().unwrap().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_timer_never_fires() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut slot = TimerSlot::default();
        let counter = Arc::clone(&fired);
        let generation = slot.arm(Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(slot.is_current(generation));
        assert!(slot.clear());
        assert!(!slot.clear());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!slot.disarm_if_current(generation));
    }
}
