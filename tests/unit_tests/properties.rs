use crate::pattern;
use fenris_mm::proptest::{execution_mode, layout_and_interior_offset, RegionLayout};
use fenris_mm::{provenance, Entry, ExecutionMode, Ledger, LedgerConfig, LedgerError, Residency};
use proptest::prelude::*;

/// Registers every region of the layout inside `buffer`, returning the region base pointers.
fn insert_layout(ledger: &mut Ledger, buffer: &mut [u8], layout: &RegionLayout) -> Vec<*mut u8> {
    assert!(buffer.len() >= layout.total_len());
    let base = buffer.as_mut_ptr();
    layout
        .offsets()
        .into_iter()
        .zip(&layout.sizes)
        .map(|(offset, &bytes)| {
            let ptr = base.wrapping_add(offset);
            unsafe { ledger.insert(ptr, bytes, provenance!(), &LedgerConfig::host_only()) }.unwrap()
        })
        .collect()
}

proptest! {
    #[test]
    fn registration_round_trip(layout in any::<RegionLayout>()) {
        let config = LedgerConfig::host_only();
        let mut ledger: Ledger = Ledger::default();
        let mut buffer = pattern(layout.total_len());
        let bases = insert_layout(&mut ledger, &mut buffer, &layout);

        prop_assert_eq!(ledger.len(), layout.num_regions());
        for &base in &bases {
            prop_assert!(ledger.is_tracked(base));
        }
        ledger.validate().unwrap();

        for &base in &bases {
            ledger.erase(base, provenance!(), &config).unwrap();
            prop_assert!(!ledger.is_tracked(base));
            let is_unknown = matches!(ledger.resolve(base, &config), Err(LedgerError::UnknownAddress { .. }));
            prop_assert!(is_unknown);
        }
        prop_assert!(ledger.is_empty());
        prop_assert_eq!(buffer, pattern(layout.total_len()));
    }

    #[test]
    fn interior_addresses_are_aliases((layout, region, offset) in layout_and_interior_offset(),
                                      mode in execution_mode()) {
        let config = LedgerConfig::host_only().with_mode(mode);
        let mut ledger: Ledger = Ledger::default();
        let mut buffer = pattern(layout.total_len());
        let bases = insert_layout(&mut ledger, &mut buffer, &layout);
        let base = bases[region];
        let ptr = base.wrapping_add(offset);

        let base_id = match ledger.lookup(base) {
            Some(Entry::Tracked { id, .. }) => id,
            other => panic!("Expected tracked base, got {:?}", other),
        };

        let resolved = ledger.resolve(ptr, &config).unwrap();
        if mode == ExecutionMode::Device {
            let device = ledger.dump(base).unwrap().device.unwrap();
            prop_assert_eq!(resolved as usize, device + offset);
        } else {
            prop_assert_eq!(resolved, ptr);
        }

        let entry = ledger.lookup(ptr).unwrap();
        if offset == 0 {
            prop_assert_eq!(entry, Entry::Tracked { id: base_id, bytes: layout.sizes[region] });
        } else {
            prop_assert_eq!(entry, Entry::Alias { id: base_id, base: base as usize, offset });
        }
        ledger.validate().unwrap();
    }

    #[test]
    fn erase_leaves_no_dangling_aliases((layout, region, offset) in layout_and_interior_offset()) {
        let config = LedgerConfig::host_only();
        let mut ledger: Ledger = Ledger::default();
        let mut buffer = pattern(layout.total_len());
        let bases = insert_layout(&mut ledger, &mut buffer, &layout);
        let base = bases[region];

        // Resolve a handful of addresses in the region, including the chosen one
        let size = layout.sizes[region];
        for o in [offset, size / 2, size - 1] {
            ledger.resolve(base.wrapping_add(o), &config).unwrap();
        }
        ledger.erase(base, provenance!(), &config).unwrap();

        for o in 0..size {
            let ptr = base.wrapping_add(o);
            prop_assert!(ledger.lookup(ptr).is_none());
            let is_unknown = matches!(ledger.resolve(ptr, &config), Err(LedgerError::UnknownAddress { .. }));
            prop_assert!(is_unknown);
        }
        prop_assert!(ledger.reports().iter().all(|report| report.host != base as usize));
        ledger.validate().unwrap();
    }

    #[test]
    fn host_data_survives_device_round_trip((layout, region, offset) in layout_and_interior_offset(),
                                            seed in any::<u8>()) {
        let mut ledger: Ledger = Ledger::default();
        let mut buffer = pattern(layout.total_len());
        let bases = insert_layout(&mut ledger, &mut buffer, &layout);
        let base = bases[region];
        let size = layout.sizes[region];

        // Last host write before migrating
        let written: Vec<u8> = (0..size).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();
        unsafe { std::ptr::copy_nonoverlapping(written.as_ptr(), base, size) };

        let ptr = base.wrapping_add(offset);
        ledger.resolve(ptr, &LedgerConfig::device()).unwrap();
        prop_assert_eq!(ledger.residency(base), Some(Residency::Device));

        unsafe { std::ptr::write_bytes(base, 0, size) };
        prop_assert_eq!(ledger.resolve(ptr, &LedgerConfig::host_only()).unwrap(), ptr);
        prop_assert_eq!(ledger.residency(base), Some(Residency::Host));

        let start = layout.offsets()[region];
        prop_assert_eq!(&buffer[start..start + size], &written[..]);
    }

    #[test]
    fn re_resolving_is_idempotent((layout, region, offset) in layout_and_interior_offset(),
                                  mode in execution_mode()) {
        let config = LedgerConfig::host_only().with_mode(mode);
        let mut ledger: Ledger = Ledger::default();
        let mut buffer = pattern(layout.total_len());
        let bases = insert_layout(&mut ledger, &mut buffer, &layout);
        let ptr = bases[region].wrapping_add(offset);

        let first = ledger.resolve(ptr, &config).unwrap();
        let stats = ledger.backend().stats();
        let aliases = ledger.stats().aliases;

        let second = ledger.resolve(ptr, &config).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(ledger.backend().stats(), stats);
        prop_assert_eq!(ledger.stats().aliases, aliases);
    }
}
