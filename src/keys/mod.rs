//! Admin signing-key rotation
//!
//! The admin account carries many copies of the same public key. The chain
//! rejects a transaction whose proposal key already has one in flight, so
//! each outbound transaction leases its own key index from a [`KeyPool`]
//! and hands it back once the transaction is sealed or has failed.

pub mod crypto;

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Fixed table of busy flags, one per key index on the admin account
#[derive(Debug, Clone)]
pub struct KeyPool {
    flags: Arc<Mutex<Vec<bool>>>,
}

impl KeyPool {
    pub fn new(size: usize) -> Self {
        Self {
            flags: Arc::new(Mutex::new(vec![false; size])),
        }
    }

    /// Lease the lowest free key index, or `None` when every key is busy
    ///
    /// Callers that get `None` skip their transaction; nothing is queued.
    pub fn try_acquire(&self) -> Option<KeyLease> {
        let mut flags = self.lock();
        let index = flags.iter().position(|busy| !busy)?;
        flags[index] = true;
        debug!("Leased admin key #{}", index);
        Some(KeyLease {
            index,
            flags: Arc::clone(&self.flags),
        })
    }

    pub fn capacity(&self) -> usize {
        self.lock().len()
    }

    pub fn in_use(&self) -> usize {
        self.lock().iter().filter(|busy| **busy).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<bool>> {
        // A panic while holding the lock leaves the flags consistent.
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A leased key index; dropping the lease frees the index
#[derive(Debug)]
pub struct KeyLease {
    index: usize,
    flags: Arc<Mutex<Vec<bool>>>,
}

impl KeyLease {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let mut flags = self
            .flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(flag) = flags.get_mut(self.index) {
            *flag = false;
        }
        debug!("Released admin key #{}", self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_leases_lowest_free_index() {
        let pool = KeyPool::new(4);
        let a = pool.try_acquire().unwrap();
        let b = pool.try_acquire().unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);

        drop(a);
        let c = pool.try_acquire().unwrap();
        assert_eq!(c.index(), 0);
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn test_exhausted_pool_returns_none() {
        let pool = KeyPool::new(3);
        let leases: Vec<_> = (0..3).map(|_| pool.try_acquire().unwrap()).collect();
        assert_eq!(pool.in_use(), 3);
        assert!(pool.try_acquire().is_none());

        drop(leases);
        assert_eq!(pool.in_use(), 0);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn test_release_on_drop_clears_flag() {
        let pool = KeyPool::new(2);
        let lease = pool.try_acquire().unwrap();
        assert_eq!(lease.index(), 0);
        assert_eq!(pool.in_use(), 1);
        drop(lease);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.try_acquire().unwrap().index(), 0);
    }

    #[test]
    fn test_failed_send_releases_key() {
        fn send(pool: &KeyPool) -> anyhow::Result<usize> {
            let lease = pool.try_acquire().ok_or_else(|| anyhow::anyhow!("busy"))?;
            anyhow::bail!("rejected by access node (key #{})", lease.index())
        }

        let pool = KeyPool::new(1);
        assert!(send(&pool).is_err());
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_concurrent_leases_are_unique() {
        let pool = KeyPool::new(64);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    (0..8)
                        .filter_map(|_| pool.try_acquire())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let leases: Vec<KeyLease> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<usize> = leases.iter().map(KeyLease::index).collect();

        assert_eq!(leases.len(), 64);
        assert_eq!(unique.len(), 64);
        assert!(pool.try_acquire().is_none());
    }
}
