//! A ledger that can be shared between threads.
use crate::config::LedgerConfig;
use crate::device::{DeviceBackend, SimulatedDevice};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::provenance::Provenance;
use parking_lot::{Mutex, MutexGuard};

/// A [`Ledger`] guarded by a single mutex.
///
/// The ledger itself performs no synchronization. All threads registering, erasing or
/// resolving pointers concurrently must go through the same `SyncLedger`, which serializes
/// every operation, including the device transfers it triggers.
#[derive(Debug)]
pub struct SyncLedger<B = SimulatedDevice> {
    inner: Mutex<Ledger<B>>,
}

impl<B> SyncLedger<B> {
    pub fn new(ledger: Ledger<B>) -> Self {
        Self {
            inner: Mutex::new(ledger),
        }
    }

    /// Locks the ledger for a sequence of operations that must not interleave with other
    /// threads.
    pub fn lock(&self) -> MutexGuard<'_, Ledger<B>> {
        self.inner.lock()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger<B>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> Ledger<B> {
        self.inner.into_inner()
    }

    pub fn is_tracked<T>(&self, ptr: *const T) -> bool {
        self.inner.lock().is_tracked(ptr)
    }
}

impl<B: DeviceBackend> SyncLedger<B> {
    /// See [`Ledger::insert`].
    ///
    /// # Safety
    ///
    /// Same as [`Ledger::insert`].
    pub unsafe fn insert<T>(
        &self,
        ptr: *mut T,
        bytes: usize,
        provenance: Provenance,
        config: &LedgerConfig,
    ) -> Result<*mut T, LedgerError> {
        self.inner.lock().insert(ptr, bytes, provenance, config)
    }

    pub fn erase<T>(&self, ptr: *mut T, provenance: Provenance, config: &LedgerConfig) -> Result<*mut T, LedgerError> {
        self.inner.lock().erase(ptr, provenance, config)
    }

    pub fn resolve<T>(&self, ptr: *mut T, config: &LedgerConfig) -> Result<*mut T, LedgerError> {
        self.inner.lock().resolve(ptr, config)
    }
}

impl Default for SyncLedger<SimulatedDevice> {
    fn default() -> Self {
        Self::new(Ledger::default())
    }
}

impl<B> From<Ledger<B>> for SyncLedger<B> {
    fn from(ledger: Ledger<B>) -> Self {
        Self::new(ledger)
    }
}
