use fenris_mm::device::{DeviceBackend, DeviceMemory, SimulatedDevice, TransferStats};

#[test]
fn allocate_and_free_update_stats() {
    let mut device = SimulatedDevice::new();
    assert_eq!(device.name(), "simulated");

    let a = device.allocate(100).unwrap();
    let b = device.allocate(28).unwrap();
    assert_ne!(a, b);
    assert_eq!(device.num_buffers(), 2);
    assert_eq!(device.stats().allocations, 2);
    assert_eq!(device.stats().allocated_bytes, 128);

    unsafe { device.free(a) }.unwrap();
    assert_eq!(device.num_buffers(), 1);
    assert_eq!(device.stats().frees, 1);
    assert_eq!(device.stats().allocated_bytes, 28);

    unsafe { device.free(b) }.unwrap();
    assert_eq!(device.stats().allocated_bytes, 0);
}

#[test]
fn new_buffers_are_zeroed() {
    let mut device = SimulatedDevice::new();
    let buffer = device.allocate(16).unwrap();
    assert_eq!(device.read(buffer, 16).unwrap(), vec![0u8; 16]);
}

#[test]
fn freeing_unknown_or_freed_buffer_fails() {
    let mut device = SimulatedDevice::new();
    let buffer = device.allocate(8).unwrap();

    assert!(unsafe { device.free(buffer.wrapping_add(1)) }.is_err());
    unsafe { device.free(buffer) }.unwrap();
    assert!(unsafe { device.free(buffer) }.is_err());
    assert_eq!(device.stats().frees, 1);
}

#[test]
fn zero_sized_buffers_have_distinct_addresses() {
    let mut device = SimulatedDevice::new();
    let a = device.allocate(0).unwrap();
    let b = device.allocate(0).unwrap();
    assert_ne!(a, b);
    assert!(device.read(a, 0).unwrap().is_empty());
    assert!(device.read(a, 1).is_err());
}

#[test]
fn transfers_move_data_both_ways() {
    let mut device = SimulatedDevice::new();
    let buffer = device.allocate(8).unwrap();
    let host = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let mut back = [0u8; 4];

    unsafe {
        device.copy_host_to_device(buffer, host.as_ptr(), 8).unwrap();
        device
            .copy_device_to_host(back.as_mut_ptr(), buffer.wrapping_add(2), 4)
            .unwrap();
    }
    assert_eq!(back, [3, 4, 5, 6]);
    assert_eq!(
        device.stats(),
        TransferStats {
            allocations: 1,
            allocated_bytes: 8,
            host_to_device_copies: 1,
            host_to_device_bytes: 8,
            device_to_host_copies: 1,
            device_to_host_bytes: 4,
            ..TransferStats::default()
        }
    );
    assert_eq!(device.stats().copies(), 2);
}

#[test]
fn out_of_range_transfers_fail() {
    let mut device = SimulatedDevice::new();
    let buffer = device.allocate(8).unwrap();
    let host = [0u8; 16];
    let mut sink = [0u8; 16];

    unsafe {
        assert!(device.copy_host_to_device(buffer, host.as_ptr(), 9).is_err());
        assert!(device
            .copy_host_to_device(buffer.wrapping_add(4), host.as_ptr(), 5)
            .is_err());
        assert!(device
            .copy_device_to_host(sink.as_mut_ptr(), buffer.wrapping_add(9), 0)
            .is_err());
        assert!(device
            .copy_device_to_device(buffer, buffer.wrapping_add(1), 8, false)
            .is_err());
    }
    assert_eq!(device.stats().copies(), 0);

    // Host memory is not device memory
    assert!(device.read(host.as_ptr(), 1).is_err());
}

#[test]
fn asynchronous_copies_are_deferred_until_synchronized() {
    let mut device = SimulatedDevice::new();
    let src = device.allocate(4).unwrap();
    let dst = device.allocate(4).unwrap();
    device.write(src, &[1, 2, 3, 4]).unwrap();

    unsafe { device.copy_device_to_device(dst, src, 4, true) }.unwrap();
    assert_eq!(device.num_pending_copies(), 1);
    assert_eq!(device.read(dst, 4).unwrap(), vec![0; 4]);

    device.synchronize().unwrap();
    assert_eq!(device.num_pending_copies(), 0);
    assert_eq!(device.read(dst, 4).unwrap(), vec![1, 2, 3, 4]);

    let stats = device.stats();
    assert_eq!(stats.device_to_device_copies, 1);
    assert_eq!(stats.asynchronous_copies, 1);
}

#[test]
fn asynchronous_copies_complete_in_order() {
    let mut device = SimulatedDevice::new();
    let a = device.allocate(4).unwrap();
    let b = device.allocate(4).unwrap();
    let c = device.allocate(4).unwrap();
    device.write(a, &[9, 9, 9, 9]).unwrap();

    unsafe {
        device.copy_device_to_device(b, a, 4, true).unwrap();
        device.copy_device_to_device(c, b, 4, true).unwrap();
    }
    // A synchronous transfer first completes everything that was queued before it
    let mut host = [0u8; 4];
    unsafe { device.copy_device_to_host(host.as_mut_ptr(), c, 4) }.unwrap();
    assert_eq!(host, [9, 9, 9, 9]);
    assert_eq!(device.num_pending_copies(), 0);
}

#[test]
fn memory_limit_bounds_live_allocations() {
    let mut device = SimulatedDevice::new().with_memory_limit(100);
    let a = device.allocate(60).unwrap();
    let err = device.allocate(41).unwrap_err();
    assert!(err.to_string().contains("Out of device memory"));

    unsafe { device.free(a) }.unwrap();
    device.allocate(100).unwrap();
}

#[test]
fn reset_stats_keeps_live_bytes() {
    let mut device = SimulatedDevice::new();
    let buffer = device.allocate(32).unwrap();
    device.write(buffer, &[1; 32]).unwrap();
    unsafe { device.copy_host_to_device(buffer, [0u8; 32].as_ptr(), 32) }.unwrap();

    device.reset_stats();
    assert_eq!(
        device.stats(),
        TransferStats {
            allocated_bytes: 32,
            ..TransferStats::default()
        }
    );
}

#[test]
fn boxed_backends_forward_to_the_inner_backend() {
    let mut device: Box<dyn DeviceBackend> = Box::new(SimulatedDevice::new());
    assert_eq!(device.name(), "simulated");
    let buffer = device.allocate(4).unwrap();
    unsafe { device.free(buffer) }.unwrap();
    device.synchronize().unwrap();
}

#[test]
fn host_wrapper_memory_handles() {
    let values = [1.0f64, 2.0, 3.0];
    let memory = DeviceMemory::wrap_host(values.as_ptr());
    assert!(memory.is_host_wrapper());
    assert_eq!(memory.as_ptr::<f64>() as *const f64, values.as_ptr());

    let memory = DeviceMemory { address: 0x1000, bytes: 24 };
    assert!(!memory.is_host_wrapper());
}
