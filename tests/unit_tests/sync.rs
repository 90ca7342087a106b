use crate::pattern;
use fenris_mm::{provenance, Ledger, LedgerConfig, Residency, SyncLedger};
use std::thread;

#[test]
fn threads_share_one_ledger() {
    let ledger: SyncLedger = SyncLedger::default();
    let num_threads = 8;

    thread::scope(|scope| {
        for i in 0..num_threads {
            let ledger = &ledger;
            scope.spawn(move || {
                let mut buffer = pattern(64 + i);
                let ptr = buffer.as_mut_ptr();
                let host = LedgerConfig::host_only();
                let device = LedgerConfig::device();

                unsafe { ledger.insert(ptr, buffer.len(), provenance!(), &host) }.unwrap();
                assert!(ledger.is_tracked(ptr));
                ledger.resolve(ptr.wrapping_add(i), &device).unwrap();
                ledger.resolve(ptr, &host).unwrap();
                ledger.erase(ptr, provenance!(), &host).unwrap();
                assert!(!ledger.is_tracked(ptr));
                assert_eq!(buffer, pattern(64 + i));
            });
        }
    });

    let ledger = ledger.into_inner();
    assert!(ledger.is_empty());
    assert_eq!(ledger.stats().aliases, 0);
    let stats = ledger.backend().stats();
    assert_eq!(stats.allocations, num_threads);
    assert_eq!(stats.frees, num_threads);
    assert_eq!(stats.allocated_bytes, 0);
    ledger.validate().unwrap();
}

#[test]
fn lock_groups_operations() {
    let ledger: SyncLedger = Ledger::default().into();
    let mut buffer = pattern(32);
    let ptr = buffer.as_mut_ptr();

    {
        let mut guard = ledger.lock();
        unsafe { guard.insert(ptr, 32, provenance!(), &LedgerConfig::host_only()) }.unwrap();
        guard.resolve(ptr, &LedgerConfig::device()).unwrap();
        assert_eq!(guard.residency(ptr), Some(Residency::Device));
    }

    let residency = ledger.with(|ledger| ledger.residency(ptr));
    assert_eq!(residency, Some(Residency::Device));
}

#[test]
fn sync_ledger_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SyncLedger>();
}
