use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

/// We define various kinds of latches, which are all a primitive signaling
/// mechanism. A latch starts as false. Eventually someone calls `set()` and
/// it becomes true. You can test if it has been set by calling `is_set()`.
pub trait Latch {
    /// Test if the latch is set.
    fn is_set(&self) -> bool;
}

/// A Latch starts as false and eventually becomes true by carrying a value. You
/// can block until it becomes true, and take the value out afterwards.
pub struct LockLatch<T> {
    m: Mutex<LockLatchState<T>>,
    v: Condvar,
}

enum LockLatchState<T> {
    NotReady,
    Ok(T),
    Taken,
}

impl<T> LockLatch<T> {
    #[inline]
    pub fn new() -> Self {
        LockLatch {
            m: Mutex::new(LockLatchState::NotReady),
            v: Condvar::new(),
        }
    }

    /// Sets the latch with `value`, waking up all the waiting threads. Only the
    /// first value is kept.
    pub fn set(&self, value: T) {
        let mut guard = self.lock();
        if let LockLatchState::NotReady = *guard {
            *guard = LockLatchState::Ok(value);
        }

        self.v.notify_all();
    }

    /// Block until latch is set.
    pub fn wait(&self) {
        let mut guard = self.lock();
        while let LockLatchState::NotReady = *guard {
            guard = self.v.wait(guard).unwrap_or_else(|err| err.into_inner());
        }
    }

    /// Takes the value out of a set latch. Returns `None` if the latch has not
    /// been set yet, or the value has been taken already.
    pub fn take(&self) -> Option<T> {
        let mut guard = self.lock();
        match std::mem::replace(&mut *guard, LockLatchState::Taken) {
            LockLatchState::Ok(v) => Some(v),
            LockLatchState::NotReady => {
                *guard = LockLatchState::NotReady;
                None
            }
            LockLatchState::Taken => None,
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<LockLatchState<T>> {
        self.m.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<T> Default for LockLatch<T> {
    fn default() -> Self {
        LockLatch::new()
    }
}

impl<T> Latch for LockLatch<T> {
    #[inline]
    fn is_set(&self) -> bool {
        match *self.lock() {
            LockLatchState::NotReady => false,
            _ => true,
        }
    }
}

/// Counting latches are used to track outstanding jobs. Unlike other latches,
/// calling `set()` does not necessarily make the latch be considered `set()`;
/// instead, it just decrements the counter. The latch is only "set" (in the sense
/// that `is_set()` returns true) once the counter reaches zero.
#[derive(Debug)]
pub struct CountLatch {
    counter: AtomicUsize,
}

impl CountLatch {
    #[inline]
    pub fn new() -> CountLatch {
        CountLatch {
            counter: AtomicUsize::new(1),
        }
    }

    #[inline]
    pub fn increment(&self) {
        debug_assert!(!self.is_set());
        self.counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the counter, releasing everyone who waits on it once it reaches zero.
    #[inline]
    pub fn set(&self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for CountLatch {
    fn default() -> Self {
        CountLatch::new()
    }
}

impl Latch for CountLatch {
    #[inline]
    fn is_set(&self) -> bool {
        // Need to acquire any memory reads before latch was set:
        self.counter.load(Ordering::SeqCst) == 0
    }
}
