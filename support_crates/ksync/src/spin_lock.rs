use core::cell::UnsafeCell;
use core::fmt::{Debug, Formatter};
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A mutex that busy-waits until the lock becomes free
pub struct SpinLock<T> {
    is_locked: AtomicBool,
    value: UnsafeCell<T>,
}

/// Exclusive access to the value of a locked [`SpinLock`].
///
/// The lock is released when the guard is dropped.
pub struct Guard<'a, T> {
    lock: &'a SpinLock<T>,
}

/// The error returned by [`SpinLock::try_lock`] when the lock is currently held by someone else
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WouldBlock;

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            is_locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock if it is currently free
    pub fn try_lock(&self) -> Result<Guard<T>, WouldBlock> {
        if self.is_locked.swap(true, Ordering::Acquire) {
            Err(WouldBlock)
        } else {
            Ok(Guard { lock: self })
        }
    }

    /// Acquire the lock, spinning for as long as another holder has it
    pub fn spin_lock(&self) -> Guard<T> {
        loop {
            if let Ok(guard) = self.try_lock() {
                return guard;
            }
            // wait for the holder to release before attempting another (cache line invalidating) swap
            while self.is_locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Whether the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.is_locked.load(Ordering::Relaxed)
    }

    /// Access the protected value without locking.
    ///
    /// This is possible because the mutable borrow statically guarantees that no [`Guard`] exists.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consume the lock and return the protected value
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    fn unlock(&self) {
        self.is_locked.store(false, Ordering::Release)
    }
}

unsafe impl<T> Sync for SpinLock<T> where T: Send {}
unsafe impl<T> Send for SpinLock<T> where T: Send {}

impl<T> Debug for SpinLock<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpinLock")
            .field("is_locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

impl<T> Deref for Guard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // Safety: a Guard only exists while the lock is held
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for Guard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Safety: a Guard only exists while the lock is held
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for Guard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    #[test]
    fn test_try_lock_fails_while_locked() {
        let lock = SpinLock::new(0u32);
        let guard = lock.try_lock().unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.try_lock().err(), Some(WouldBlock));
        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_lock().is_ok());
    }

    #[test]
    fn test_guard_gives_mutable_access() {
        let lock = SpinLock::new(41u32);
        *lock.spin_lock() += 1;
        assert_eq!(lock.into_inner(), 42);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let lock = Arc::new(SpinLock::new(0usize));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *lock.spin_lock() += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*lock.spin_lock(), 4000);
    }
}
